//! Committed territories and the in-memory store that holds them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::MIN_POLYGON_POINTS;
use super::draft::ValidationError;
use super::geometry::{self, Point};

/// An sRGB color written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The same color at the given opacity (clamped to 0..=1).
    pub fn with_alpha(self, alpha: f64) -> Rgba {
        Rgba {
            r: self.r,
            g: self.g,
            b: self.b,
            a: alpha.clamp(0.0, 1.0),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::rgb(0x3B, 0x82, 0xF6)
    }
}

impl FromStr for Color {
    type Err = ValidationError;

    /// Accepts `#RRGGBB` and `#RGB`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Ok(Color::rgb(r * 17, g * 17, b * 17))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A color with opacity, as handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

/// Unique key of a committed territory. Names may collide; ids never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerritoryId(Uuid);

impl TerritoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TerritoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named, colored, closed polygon. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Territory {
    id: TerritoryId,
    name: String,
    points: Vec<Point>,
    color: Color,
}

impl Territory {
    /// Build a territory with a fresh id. Rejects fewer than three points and
    /// blank names; the stored name is trimmed.
    pub fn new(name: &str, points: Vec<Point>, color: Color) -> Result<Self, ValidationError> {
        if points.len() < MIN_POLYGON_POINTS {
            return Err(ValidationError::InsufficientPoints {
                got: points.len(),
                required: MIN_POLYGON_POINTS,
            });
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            id: TerritoryId::new(),
            name: name.to_string(),
            points,
            color,
        })
    }

    pub fn id(&self) -> TerritoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Label anchor: mean of the vertices.
    pub fn centroid(&self) -> Point {
        // Never empty: construction requires three points.
        geometry::centroid(&self.points).unwrap_or_default()
    }

    pub fn contains(&self, p: &Point) -> bool {
        geometry::contains(&self.points, p)
    }

    /// Persistence form without the id.
    pub fn export(&self) -> TerritoryExport {
        TerritoryExport {
            name: self.name.clone(),
            points: self.points.clone(),
            color: self.color,
        }
    }
}

/// A territory as exchanged with the persistence endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryExport {
    pub name: String,
    pub points: Vec<Point>,
    pub color: Color,
}

impl TerritoryExport {
    /// Validate and assign a fresh id.
    pub fn into_territory(self) -> Result<Territory, ValidationError> {
        Territory::new(&self.name, self.points, self.color)
    }
}

/// Request/response body: `{territories: [{name, points, color}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerritorySet {
    pub territories: Vec<TerritoryExport>,
}

impl TerritorySet {
    /// Validate every entry and trim names. The error carries the index of
    /// the first bad entry.
    pub fn normalized(self) -> Result<TerritorySet, (usize, ValidationError)> {
        let territories = self
            .territories
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_territory().map(|t| t.export()).map_err(|e| (i, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TerritorySet { territories })
    }
}

/// Committed territories in insertion order. No size limit, no eviction.
#[derive(Debug, Clone, Default)]
pub struct TerritoryStore {
    territories: Vec<Territory>,
}

impl TerritoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, territory: Territory) {
        self.territories.push(territory);
    }

    /// Remove by id. Returns whether anything was removed; absent ids are a no-op.
    pub fn remove(&mut self, id: TerritoryId) -> bool {
        let before = self.territories.len();
        self.territories.retain(|t| t.id != id);
        self.territories.len() != before
    }

    pub fn get(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.iter().find(|t| t.id == id)
    }

    /// Territories in insertion order. The borrow pins the store for the
    /// lifetime of the iterator.
    pub fn list(&self) -> impl Iterator<Item = &Territory> + '_ {
        self.territories.iter()
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    pub fn clear(&mut self) {
        self.territories.clear();
    }

    /// Topmost (last drawn) territory containing `p`.
    pub fn hit_test(&self, p: &Point) -> Option<TerritoryId> {
        self.territories
            .iter()
            .rev()
            .find(|t| t.contains(p))
            .map(|t| t.id)
    }

    /// Serialize everything without ids, for the persistence endpoint.
    pub fn export_all(&self) -> TerritorySet {
        TerritorySet {
            territories: self.territories.iter().map(Territory::export).collect(),
        }
    }

    /// Replace the contents with a persisted set. Nothing changes if any
    /// entry is invalid.
    pub fn replace_all(&mut self, set: TerritorySet) -> Result<(), ValidationError> {
        let territories = set
            .territories
            .into_iter()
            .map(TerritoryExport::into_territory)
            .collect::<Result<Vec<_>, _>>()?;
        self.territories = territories;
        Ok(())
    }
}
