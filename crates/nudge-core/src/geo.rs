//! Positions, great-circle distance and the in-memory spatial index.
//!
//! The index is a brute-force scan over a hash map. Expected population is a
//! few hundred concurrently present actors, for which a scan beats the
//! bookkeeping of a grid or tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, actor::ActorId};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// ─── Position ────────────────────────────────────────────────────────────────

/// A point on the Earth's surface in decimal degrees.
///
/// This is the only accepted coordinate encoding. WKT strings such as
/// `"POINT(lng lat)"` or bare `[lat, lng]` arrays do not deserialise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Position {
  /// Build a validated position.
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    let p = Self { latitude, longitude };
    p.validate()?;
    Ok(p)
  }

  /// Both coordinates must be finite, latitude within `[-90, 90]` and
  /// longitude within `[-180, 180]`.
  pub fn validate(&self) -> Result<()> {
    let ok = self.latitude.is_finite()
      && self.longitude.is_finite()
      && (-90.0..=90.0).contains(&self.latitude)
      && (-180.0..=180.0).contains(&self.longitude);
    if ok {
      Ok(())
    } else {
      Err(Error::InvalidPosition {
        latitude:  self.latitude,
        longitude: self.longitude,
      })
    }
  }

  pub fn distance_to(&self, other: &Position) -> f64 {
    haversine_distance(self, other)
  }
}

/// Great-circle distance in meters between two positions.
pub fn haversine_distance(a: &Position, b: &Position) -> f64 {
  let lat1 = a.latitude.to_radians();
  let lat2 = b.latitude.to_radians();
  // Absolute deltas keep the result bit-for-bit symmetric in `a` and `b`.
  let d_lat = (b.latitude - a.latitude).abs().to_radians();
  let d_lon = (b.longitude - a.longitude).abs().to_radians();

  let h = (d_lat / 2.0).sin().powi(2)
    + (lat1.cos() * lat2.cos()) * (d_lon / 2.0).sin().powi(2);
  // Rounding can push `h` a hair above 1 for antipodal points.
  let c = 2.0 * h.sqrt().min(1.0).asin();
  EARTH_RADIUS_METERS * c
}

// ─── GeoIndex ────────────────────────────────────────────────────────────────

/// One result of a radius query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
  pub actor:           ActorId,
  pub distance_meters: f64,
}

/// The set of currently indexed actors and their positions.
#[derive(Debug, Default)]
pub struct GeoIndex {
  points: HashMap<ActorId, Position>,
}

impl GeoIndex {
  pub fn new() -> Self { Self::default() }

  /// Index `actor` at `position`, replacing any previous position.
  pub fn insert(&mut self, actor: ActorId, position: Position) {
    self.points.insert(actor, position);
  }

  pub fn remove(&mut self, actor: ActorId) -> Option<Position> {
    self.points.remove(&actor)
  }

  /// Move an already indexed actor. Returns `false` if the actor is not in
  /// the index, in which case nothing changes.
  pub fn update(&mut self, actor: ActorId, position: Position) -> bool {
    match self.points.get_mut(&actor) {
      Some(p) => {
        *p = position;
        true
      }
      None => false,
    }
  }

  pub fn get(&self, actor: ActorId) -> Option<Position> {
    self.points.get(&actor).copied()
  }

  pub fn len(&self) -> usize { self.points.len() }

  pub fn is_empty(&self) -> bool { self.points.is_empty() }

  /// All indexed actors within `radius_meters` of `center` (inclusive),
  /// nearest first. Equal distances are ordered by actor id.
  pub fn query_within_radius(
    &self,
    center: &Position,
    radius_meters: f64,
  ) -> Vec<Neighbor> {
    let mut hits: Vec<Neighbor> = self
      .points
      .iter()
      .map(|(actor, p)| Neighbor {
        actor:           *actor,
        distance_meters: haversine_distance(center, p),
      })
      .filter(|n| n.distance_meters <= radius_meters)
      .collect();

    hits.sort_by(|a, b| {
      a.distance_meters
        .total_cmp(&b.distance_meters)
        .then_with(|| a.actor.cmp(&b.actor))
    });
    hits
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pos(lat: f64, lon: f64) -> Position { Position::new(lat, lon).unwrap() }

  #[test]
  fn distance_is_symmetric_and_zero_on_self() {
    let samples = [
      pos(0.0, 0.0),
      pos(51.5007, -0.1246),
      pos(-33.8568, 151.2153),
      pos(89.9, 179.9),
      pos(-89.9, -179.9),
    ];
    for a in &samples {
      assert_eq!(haversine_distance(a, a), 0.0);
      for b in &samples {
        assert_eq!(haversine_distance(a, b), haversine_distance(b, a));
      }
    }
  }

  #[test]
  fn small_longitude_step_at_equator() {
    // 0.00045 degrees of longitude on the equator is ~50 m.
    let d = haversine_distance(&pos(0.0, 0.0), &pos(0.0, 0.00045));
    assert!((d - 50.04).abs() < 0.1, "distance was {d}");
  }

  #[test]
  fn rejects_out_of_range_and_non_finite() {
    assert!(matches!(
      Position::new(90.5, 0.0),
      Err(Error::InvalidPosition { .. })
    ));
    assert!(Position::new(0.0, -180.01).is_err());
    assert!(Position::new(f64::NAN, 0.0).is_err());
    assert!(Position::new(0.0, f64::INFINITY).is_err());
    assert!(Position::new(-90.0, 180.0).is_ok());
  }

  #[test]
  fn rejects_wkt_and_array_encodings() {
    assert!(serde_json::from_str::<Position>(r#""POINT(10 20)""#).is_err());
    assert!(serde_json::from_str::<Position>("[20.0, 10.0]").is_err());
    let p: Position =
      serde_json::from_str(r#"{"latitude": 20.0, "longitude": 10.0}"#).unwrap();
    assert_eq!(p, pos(20.0, 10.0));
  }

  #[test]
  fn query_orders_by_distance_then_id() {
    let mut index = GeoIndex::new();
    let center = pos(0.0, 0.0);
    let far = ActorId::new();
    let near = ActorId::new();
    let outside = ActorId::new();
    index.insert(far, pos(0.0, 0.0004));
    index.insert(near, pos(0.0, 0.0001));
    index.insert(outside, pos(0.0, 0.01));

    let hits = index.query_within_radius(&center, 50.0);
    let ids: Vec<_> = hits.iter().map(|n| n.actor).collect();
    assert_eq!(ids, vec![near, far]);

    // Two actors at the same spot come back in id order.
    let mut a = ActorId::new();
    let mut b = ActorId::new();
    if b < a {
      std::mem::swap(&mut a, &mut b);
    }
    let mut index = GeoIndex::new();
    index.insert(b, pos(0.0, 0.0002));
    index.insert(a, pos(0.0, 0.0002));
    let ids: Vec<_> = index
      .query_within_radius(&center, 50.0)
      .iter()
      .map(|n| n.actor)
      .collect();
    assert_eq!(ids, vec![a, b]);
  }

  #[test]
  fn update_only_moves_known_actors() {
    let mut index = GeoIndex::new();
    let a = ActorId::new();
    assert!(!index.update(a, pos(1.0, 1.0)));
    assert!(index.is_empty());

    index.insert(a, pos(0.0, 0.0));
    assert!(index.update(a, pos(1.0, 1.0)));
    assert_eq!(index.get(a), Some(pos(1.0, 1.0)));
    assert_eq!(index.remove(a), Some(pos(1.0, 1.0)));
    assert_eq!(index.len(), 0);
  }
}
