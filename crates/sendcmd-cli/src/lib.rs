// Copyright 2025 SendCmd Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # SendCmd CLI
//!
//! Command-line interface for sendcmd, the remote command dispatcher.
//!
//! - `sendcmd serve`: run a command server that executes batches it receives
//! - `sendcmd send`: dispatch batches to one or many hosts concurrently
//!
//! Host lists and named command sets are read from a JSON file, see [`config`].

pub mod config;
pub mod render;
