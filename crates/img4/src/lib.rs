//! Parse, build and validate Apple IMG4 firmware containers.
//!
//! ```
//! use img4::container::{self, FourCc};
//! use img4::der::DerElement;
//! use img4::payload::{append_payload_to_im4p, Compression};
//!
//! let im4p = container::get_empty_im4p_container(FourCc(*b"krnl"), "KernelCache");
//! let im4p = append_payload_to_im4p(&im4p, b"kernel", Some(Compression::Lzss), None)?;
//! let img4 = container::append_im4p_to_img4(&container::get_empty_img4_container(), &im4p)?;
//!
//! let parsed = DerElement::parse(&img4.encode())?;
//! assert!(container::is_img4(&parsed));
//! assert_eq!(container::get_im4p_from_img4(&parsed)?, im4p);
//! # Ok::<(), img4::Error>(())
//! ```

pub mod container;
pub mod crypto;
pub mod der;
pub mod error;
pub mod manifest;
pub mod payload;

pub use container::{ContainerKind, FourCc};
pub use der::{DerElement, Tag};
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
