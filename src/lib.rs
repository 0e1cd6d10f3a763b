// The MIT License (MIT)
//
// Copyright (c) 2024 Ricardo Cernic
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

//! towerlight computes, caches and serves Sun/Moon alignment events between
//! a fixed tall landmark and ground photography sites: "diamond" events when
//! the Sun sits on the apex from the observer's line of sight, "pearl"
//! events for the Moon.
//!
//! The astronomy lives in flat modules (Meeus-style series in [`sun`],
//! [`moon`], [`earth`], horizontal conversion in [`transformations`], the
//! sweep in [`solver`]); the service side (settings, event cache, queue,
//! scheduler, calendar reads, composition root) lives under [`application`]
//! and [`queue`], with persistence behind the ports in [`repo`].

pub mod application;
pub mod config;
pub mod earth;
pub mod ephemeris;
pub mod error;
pub mod geometry;
pub mod julian;
pub mod models;
pub mod moon;
pub mod queue;
pub mod repo;
pub mod season;
pub mod solver;
pub mod sun;
pub mod transformations;
pub mod utils;
