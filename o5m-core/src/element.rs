//! Decoded OpenStreetMap elements and their sub-records.

use std::fmt;

/// Fixed-point coordinate in units of 1e-7 degree, as stored by `o5m`.
///
/// # Examples
///
/// ```
/// use o5m_core::FixedCoordinate;
///
/// let coordinate = FixedCoordinate::new(481_000_000, 115_000_000);
/// assert_eq!(coordinate.lat_degrees(), 48.1);
/// assert_eq!(coordinate.lon_degrees(), 11.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedCoordinate {
    /// Latitude in 1e-7 degree.
    pub lat: i32,
    /// Longitude in 1e-7 degree.
    pub lon: i32,
}

impl FixedCoordinate {
    /// Divisor converting fixed-point units into degrees.
    pub const SCALE: f64 = 1.0e7;

    /// Construct a coordinate from raw fixed-point latitude and longitude.
    #[must_use]
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Latitude in degrees.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "fixed-point to degree conversion is a float division"
    )]
    pub fn lat_degrees(self) -> f64 {
        f64::from(self.lat) / Self::SCALE
    }

    /// Longitude in degrees.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "fixed-point to degree conversion is a float division"
    )]
    pub fn lon_degrees(self) -> f64 {
        f64::from(self.lon) / Self::SCALE
    }
}

/// A top-level record of the element stream.
///
/// Tags and members are not part of the element itself; they are read from
/// the [`ElementSource`](crate::ElementSource) afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    /// A node. `coordinate` is absent for nodes without a position, which
    /// only occurs in change files.
    Node {
        /// Node identifier.
        id: i64,
        /// Node position, if present.
        coordinate: Option<FixedCoordinate>,
    },
    /// A way referencing an ordered list of nodes.
    Way {
        /// Way identifier.
        id: i64,
    },
    /// A relation referencing typed members.
    Relation {
        /// Relation identifier.
        id: i64,
    },
    /// A dataset the decoder does not understand. Consumers skip it.
    Unknown {
        /// Raw dataset type byte.
        kind: u8,
    },
}

impl Element {
    /// Identifier of the element, if it is a node, way or relation.
    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        match self {
            Self::Node { id, .. } | Self::Way { id } | Self::Relation { id } => Some(*id),
            Self::Unknown { .. } => None,
        }
    }
}

/// A key/value tag attached to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Tag key.
    pub key: &'a str,
    /// Tag value.
    pub value: &'a str,
}

/// Kind of element referenced by a relation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// The member is a node.
    Node,
    /// The member is a way.
    Way,
    /// The member is another relation.
    Relation,
    /// The member type byte was not recognised.
    Unknown(u8),
}

impl MemberKind {
    /// Label persisted in the `relation_members.type` column.
    ///
    /// # Examples
    ///
    /// ```
    /// use o5m_core::MemberKind;
    ///
    /// assert_eq!(MemberKind::Way.label(), "way");
    /// assert_eq!(MemberKind::Unknown(b'7').label(), "");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
            Self::Unknown(_) => "",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "unknown({byte:#04x})"),
            known => f.write_str(known.label()),
        }
    }
}

/// A member reference of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member<'a> {
    /// Kind of the referenced element.
    pub kind: MemberKind,
    /// Identifier of the referenced element.
    pub id: i64,
    /// Role of the member within the relation; may be empty.
    pub role: &'a str,
}

/// Order in which a source exposes the sub-sequences of ways and relations.
///
/// Sub-sequences are single pass, so consumers must drain them in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionOrder {
    /// Node references or relation members precede tags (the `o5m` layout).
    #[default]
    MembersFirst,
    /// Tags precede node references or relation members.
    TagsFirst,
}
