// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF operations: reading and restructuring existing documents, building new
// ones from images, tables and text, and rasterising pages.

pub mod reader;
pub mod table;
pub mod writer;

#[cfg(feature = "render")]
pub mod render;
