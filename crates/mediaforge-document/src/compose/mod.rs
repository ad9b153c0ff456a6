// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image compositing: collages, memes, placeholders and icon sets.

pub mod collage;
pub mod icons;
pub mod meme;
pub mod placeholder;
