//! Skyline route planner for bus networks.
//!
//! Given a station network with road distances and observed trip flows, find
//! the routes between two stations that no other route beats on every
//! criterion at once: total travel time, passenger flow served and
//! directness.
//!
//! Typical use:
//!
//! 1. load a [`stations::StationContext`] with [`stations::load_context`];
//! 2. build the admissible [`graph::StationGraph`] with a
//!    [`graph::GraphBuilder`];
//! 3. search it with [`search::SkylineSearch`] (or one of the baselines) and
//!    read the frontier off the returned [`skyline::RouteList`].
//!
//! The [`web`] module serves the same pipeline over HTTP.

pub mod graph;
pub mod search;
pub mod skyline;
pub mod stations;
pub mod web;

#[cfg(test)]
pub(crate) mod fixtures;
