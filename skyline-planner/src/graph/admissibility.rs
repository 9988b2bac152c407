//! Edge admissibility and zigzag predicates.
//!
//! An edge `current → target` is kept during graph construction only when
//! `target` moves forward along the origin→destination axis, lies farther from
//! the origin, and lies closer to the destination than `current`. The zigzag
//! test is applied at search time to whole route prefixes.

use crate::stations::{Station, StationContext, StationId};

/// `target` projects further along the origin→destination direction than `current`.
pub fn is_moving_forward(
    target: &Station,
    current: &Station,
    origin: &Station,
    destination: &Station,
) -> bool {
    let (dx, dy) = destination.offset_from(origin);
    let theta = dy.atan2(dx);
    let (sin, cos) = theta.sin_cos();
    let project = |station: &Station| {
        let (x, y) = station.offset_from(origin);
        x * cos + y * sin
    };
    project(target) > project(current)
}

/// `target` is strictly farther from the origin than `current`.
pub fn is_origin_farther(
    context: &StationContext,
    target: &Station,
    current: &Station,
    origin: &Station,
) -> bool {
    context.distance(origin.id, target.id) > context.distance(origin.id, current.id)
}

/// `target` is strictly closer to the destination than `current`.
pub fn is_destination_closer(
    context: &StationContext,
    target: &Station,
    current: &Station,
    destination: &Station,
) -> bool {
    context.distance(target.id, destination.id) < context.distance(current.id, destination.id)
}

/// All three construction predicates hold for `current → target`.
pub fn is_admissible(
    context: &StationContext,
    target: &Station,
    current: &Station,
    origin: &Station,
    destination: &Station,
) -> bool {
    is_moving_forward(target, current, origin, destination)
        && is_origin_farther(context, target, current, origin)
        && is_destination_closer(context, target, current, destination)
}

/// Appending `candidate` to `route` would zigzag: some earlier station of the
/// route is strictly closer to `candidate` than the route's last station.
///
/// An empty route never zigzags.
pub fn is_zigzag(context: &StationContext, candidate: StationId, route: &[StationId]) -> bool {
    let Some((&last, earlier)) = route.split_last() else {
        return false;
    };
    let reach = context.distance(last, candidate);
    earlier
        .iter()
        .any(|&station| context.distance(station, candidate) < reach)
}
