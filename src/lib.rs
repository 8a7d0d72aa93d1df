// Copyright 2019 Fullstop000 <fullstop1005@gmail.com>.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! A reader for DLIS (Digital Log Interchange Standard, RP66 V1) well-log
//! files: locates the physical envelope, assembles logical records,
//! decodes metadata object-sets into a queryable pool, and materialises
//! frame curve data on demand.

#[macro_use]
extern crate lazy_static;
extern crate log;
extern crate regex;

pub mod codec;
pub mod escape;
pub mod frame;
pub mod index;
pub mod loader;
pub mod objects;
pub mod record;
pub mod source;
mod util;

pub use codec::{DTime, Repcode, Value};
pub use escape::{get_escape_level, set_escape_level, Escape};
pub use frame::CurveTable;
pub use loader::{load, load_with, LoadOptions, LogicalFile, LogicalFiles};
pub use objects::views::{ChannelView, FrameView, OriginView, ParameterView, ToolView, UnknownView};
pub use objects::{Object, Pool, Problematic};
pub use util::fingerprint::{Fingerprint, Obname, TypeTag};
pub use util::status::{Fault, FaultKind, Result, Severity};
