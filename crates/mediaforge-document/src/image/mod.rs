// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image operations.

pub mod background;
pub mod base64;
pub mod palette;
pub mod processor;
pub mod svg;
