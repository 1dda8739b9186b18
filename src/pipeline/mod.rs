//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements one step; [`crate::convert`] wires them
//! together with a bounded worker pool.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ order ──▶ page ──▶ assemble ──▶ archive
//! (walk)    (sort)   (1 PDF    (merge,      (AES ZIP,
//!                     per img)  persist)     optional)
//! ```
//!
//! 1. [`input`]    list the images of a collection directory
//! 2. [`order`]    natural ordering of item names ("2" before "10")
//! 3. [`page`]     decode one image into a single-page PDF; CPU-bound,
//!    runs in `spawn_blocking`
//! 4. [`assemble`] merge the pages in index order and write atomically
//! 5. [`archive`]  pack the document into a password-protected ZIP

pub mod archive;
pub mod assemble;
pub mod input;
pub mod order;
pub mod page;
