// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kompakt-telemetry — Anonymous document fingerprinting and result recording.
//
// Documents are identified only by a SHA-256 over technical characteristics
// (size, header version, edge hashes, page count). Results go to an
// append-only JSON-lines log behind the `TelemetrySink` trait; the default
// sink records nothing.

pub mod fingerprint;
pub mod recorder;

pub use fingerprint::{DocumentFingerprint, anonymous_id, hash_bytes};
pub use recorder::{
    JsonlTelemetry, NoopTelemetry, TelemetryEvent, TelemetrySink, TelemetrySummary, summarize,
};
