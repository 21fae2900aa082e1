//! Object lookup under a pointing ray's impact point.

use serde::{Deserialize, Serialize};

use crate::blackboard::Vec3;

/// A named object found near an impact point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedObject {
    pub name: String,
    pub position: Vec3,
}

impl ResolvedObject {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Finds the object, if any, within `radius` of `point`.
pub trait ObjectResolver: Send {
    fn resolve(&self, point: Vec3, radius: f64) -> Option<ResolvedObject>;
}

/// A scene without resolvable objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObjects;

impl ObjectResolver for NoObjects {
    fn resolve(&self, _point: Vec3, _radius: f64) -> Option<ResolvedObject> {
        None
    }
}

/// A fixed set of objects. Resolves to the nearest one in range; on a tie
/// the object added first wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticScene {
    objects: Vec<ResolvedObject>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, position: Vec3) -> Self {
        self.add(name, position);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, position: Vec3) {
        self.objects.push(ResolvedObject::new(name, position));
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<ResolvedObject> for StaticScene {
    fn from_iter<I: IntoIterator<Item = ResolvedObject>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl ObjectResolver for StaticScene {
    fn resolve(&self, point: Vec3, radius: f64) -> Option<ResolvedObject> {
        let mut best: Option<(&ResolvedObject, f64)> = None;
        for object in &self.objects {
            let d = object.position.distance(&point);
            if d > radius {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((object, d));
            }
        }
        best.map(|(object, _)| object.clone())
    }
}
