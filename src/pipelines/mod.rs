// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured frames
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  PNG bytes   │
//! │   (RGBA)     │     │  - Overlay        │     │              │
//! │              │     │  - Identity text  │     │              │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Frame compositing and PNG encoding

pub mod photo;
