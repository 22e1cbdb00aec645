//! Member selection policy and layout metadata for the `exabin` codec.
//!
//! A composite type participates in the wire format through a subset of its
//! members. Which subset is determined by the type's *marker mode* together
//! with the attributes of each member. This crate models both sides of that
//! decision so the policy exists exactly once: the derive macros evaluate it
//! at expansion time to decide what to emit, and the core crate exposes the
//! same metadata at run time through the [`Described`] trait.
//!
//! The model is deliberately wider than what Rust source can express. It
//! distinguishes fields from properties and tracks getter/setter visibility
//! because the wire format was designed around object models that have both;
//! keeping the full policy here lets it be tested exhaustively even though
//! derived Rust types only ever produce [`MemberKind::Field`] entries.

/// How a composite type marks the members that participate in its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarkerMode {
    /// Public members participate: public fields, plus properties with a
    /// public getter and setter that take no index arguments.
    #[default]
    Plain,
    /// Every field participates unless explicitly excluded, regardless of
    /// visibility. Properties never participate in this mode.
    LegacySerializable,
    /// Only explicitly marked members participate, regardless of visibility.
    Contract,
}

/// Whether a member is a plain field or a property with accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property {
        public_getter: bool,
        public_setter: bool,
        indexed: bool,
    },
}

/// Everything the selection policy needs to know about one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAttrs {
    pub kind: MemberKind,
    pub is_public: bool,
    /// Read-only members can never be assigned during decoding and are
    /// excluded in every mode.
    pub read_only: bool,
    /// Explicitly excluded from serialization.
    pub excluded: bool,
    /// Explicitly marked for inclusion under [`MarkerMode::Contract`].
    pub marked: bool,
}

impl MemberAttrs {
    /// A public field with no markings, the common case.
    pub fn public_field() -> Self {
        Self {
            kind: MemberKind::Field,
            is_public: true,
            read_only: false,
            excluded: false,
            marked: false,
        }
    }

    /// A private field with no markings.
    pub fn private_field() -> Self {
        Self { is_public: false, ..Self::public_field() }
    }
}

/// One named member of a composite type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub attrs: MemberAttrs,
}

impl Member {
    pub fn new(name: impl Into<String>, attrs: MemberAttrs) -> Self {
        Self { name: name.into(), attrs }
    }
}

/// The computed layout of one composite type: its marker mode and its
/// members in declaration order. Base types contribute their own level
/// through their own (leading) member, so a `LevelInfo` always describes a
/// single type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelInfo {
    pub type_name: String,
    pub mode: MarkerMode,
    pub members: Vec<Member>,
}

impl LevelInfo {
    /// The members that participate in the wire form, in wire order.
    pub fn selected(&self) -> Vec<&Member> {
        select(self.mode, &self.members)
            .into_iter()
            .map(|index| &self.members[index])
            .collect()
    }
}

/// Run-time access to the layout computed for a derived type.
pub trait Described {
    fn describe() -> LevelInfo;
}

/// Decides whether a single member participates under the given mode.
///
/// Read-only and explicitly excluded members never participate. Beyond
/// that:
///
/// - [`MarkerMode::Plain`]: public fields, and properties whose getter and
///   setter are both public and which take no index arguments;
/// - [`MarkerMode::LegacySerializable`]: every field, properties never;
/// - [`MarkerMode::Contract`]: exactly the marked members.
pub fn included(mode: MarkerMode, attrs: &MemberAttrs) -> bool {
    if attrs.read_only || attrs.excluded {
        return false;
    }

    match mode {
        MarkerMode::Plain => match attrs.kind {
            MemberKind::Field => attrs.is_public,
            MemberKind::Property { public_getter, public_setter, indexed } => {
                public_getter && public_setter && !indexed
            }
        },
        MarkerMode::LegacySerializable => matches!(attrs.kind, MemberKind::Field),
        MarkerMode::Contract => attrs.marked,
    }
}

/// Selects the participating members, returning their indices in
/// declaration order. Declaration order is wire order; the policy never
/// reorders.
pub fn select(mode: MarkerMode, members: &[Member]) -> Vec<usize> {
    members
        .iter()
        .enumerate()
        .filter(|(_, member)| included(mode, &member.attrs))
        .map(|(index, _)| index)
        .collect()
}
