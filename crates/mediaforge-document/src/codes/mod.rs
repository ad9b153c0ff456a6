// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Machine-readable codes: QR generation and decoding, 1D barcodes.

pub mod barcode;
pub mod qr;
