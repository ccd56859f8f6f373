// Ported from "mod" (https://pkg.go.dev/golang.org/x/mod)
// Copyright 2009 The Go Authors
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause
//
// This ports code from the original Go project "mod" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! # kt tree
//!
//! Merkle tree arithmetic for key transparency logs: RFC 6962 hashing, subtree
//! decomposition, record (audit path) proofs, consistency proofs, batched inclusion
//! proofs and monitoring frontiers.
//!
//! The stored hash layout and proof builders are ported from the original project
//! [tlog](https://pkg.go.dev/golang.org/x/mod/sumdb/tlog).

pub mod batch;
pub mod tlog;

pub use batch::*;
pub use tlog::*;
