//! Pixel geometry shared by capture, stitching and matching

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer pixel offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const ZERO: Location = Location { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by another location
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width and height of a viewport, frame or image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RectangleSize {
    pub width: i32,
    pub height: i32,
}

impl RectangleSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl fmt::Display for RectangleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in page coordinates.
///
/// A size-empty region is a sentinel for "the whole capture area", which the
/// caller resolves against whatever bounds it knows about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const EMPTY: Region = Region::new(0, 0, 0, 0);

    /// Used as screenshot bounds when nothing is known about the capture size
    pub const UNBOUNDED: Region = Region::new(0, 0, i32::MAX, i32::MAX);

    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn from_parts(location: Location, size: RectangleSize) -> Self {
        Self::new(location.x, location.y, size.width, size.height)
    }

    pub fn is_size_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn location(&self) -> Location {
        Location::new(self.left, self.top)
    }

    pub fn size(&self) -> RectangleSize {
        RectangleSize::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Whether `other` lies entirely inside this region
    pub fn contains(&self, other: &Region) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// The overlapping part of two regions, or `Region::EMPTY` when they are disjoint
    pub fn intersect(&self, other: &Region) -> Region {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return Region::EMPTY;
        }

        Region::new(left, top, right - left, bottom - top)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.left, self.top, self.width, self.height
        )
    }
}

impl std::str::FromStr for Region {
    type Err = crate::Error;

    /// Parse `left,top,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| crate::Error::InvalidArgument(format!("Invalid region '{}': {}", s, e)))?;

        match parts.as_slice() {
            [left, top, width, height] => Ok(Region::new(*left, *top, *width, *height)),
            _ => Err(crate::Error::InvalidArgument(format!(
                "Invalid region '{}': expected left,top,width,height",
                s
            ))),
        }
    }
}
