//! IMG4 extraction and composition
//!
//! ```text
//! IMG4 ::= SEQUENCE {
//!     magic   IA5String ("IMG4"),
//!     payload IM4P          OPTIONAL,
//!     manifest [0] EXPLICIT IM4M OPTIONAL,
//!     restore  [1] EXPLICIT IM4R OPTIONAL
//! }
//! ```
//!
//! Composition never edits the input; it returns a new IMG4 holding copies of
//! the existing children plus the new one.

use super::kind::{require, ContainerKind};
use crate::der::{DerElement, Tag};
use crate::{Error, Result};

/// Explicit context tag wrapping the manifest.
pub const IM4M_CONTEXT_TAG: u64 = 0;

/// Explicit context tag wrapping the restore info.
pub const IM4R_CONTEXT_TAG: u64 = 1;

/// Build an IMG4 holding only its magic.
pub fn get_empty_img4_container() -> DerElement {
    DerElement::sequence(vec![DerElement::ia5_string(ContainerKind::Img4.magic())])
}

/// Context tag a sub-container is wrapped in, if any.
fn context_tag(kind: ContainerKind) -> Option<u64> {
    match kind {
        ContainerKind::Im4m => Some(IM4M_CONTEXT_TAG),
        ContainerKind::Im4r => Some(IM4R_CONTEXT_TAG),
        _ => None,
    }
}

/// Locate the sub-container of `kind`, unwrapped.
fn find_child(img4: &DerElement, kind: ContainerKind) -> Result<Option<&DerElement>> {
    require(img4, ContainerKind::Img4)?;

    for child in img4.children()?.iter().skip(1) {
        let candidate = match context_tag(kind) {
            Some(number) if child.tag() == Tag::context(number) => child.child(0)?,
            Some(_) => continue,
            None => child,
        };
        if kind.matches(candidate) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn extract(img4: &DerElement, kind: ContainerKind) -> Result<DerElement> {
    find_child(img4, kind)?
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("{kind} in IMG4")))
}

/// Extract the payload container.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if `img4` is not an IMG4
/// - [`Error::NotFound`] if it carries no IM4P
pub fn get_im4p_from_img4(img4: &DerElement) -> Result<DerElement> {
    extract(img4, ContainerKind::Im4p)
}

/// Extract the manifest, unwrapping its `[0]` tag.
pub fn get_im4m_from_img4(img4: &DerElement) -> Result<DerElement> {
    extract(img4, ContainerKind::Im4m)
}

/// Extract the restore info, unwrapping its `[1]` tag.
pub fn get_im4r_from_img4(img4: &DerElement) -> Result<DerElement> {
    extract(img4, ContainerKind::Im4r)
}

/// Position of a child in the canonical IMG4 layout.
fn slot(child: &DerElement) -> u8 {
    if ContainerKind::Im4p.matches(child) {
        1
    } else if child.tag() == Tag::context(IM4M_CONTEXT_TAG) {
        2
    } else if child.tag() == Tag::context(IM4R_CONTEXT_TAG) {
        3
    } else {
        4
    }
}

fn append(img4: &DerElement, child: &DerElement, kind: ContainerKind) -> Result<DerElement> {
    require(child, kind)?;
    if find_child(img4, kind)?.is_some() {
        return Err(Error::Value(format!("IMG4 already contains an {kind}")));
    }

    let wrapped = match context_tag(kind) {
        Some(number) => DerElement::explicit(number, child.clone()),
        None => child.clone(),
    };

    let mut children = img4.children()?.to_vec();
    let rank = slot(&wrapped);
    let position = children
        .iter()
        .skip(1)
        .position(|existing| slot(existing) > rank)
        .map_or(children.len(), |p| p + 1);
    children.insert(position, wrapped);

    tracing::debug!(%kind, position, "appended to IMG4");
    Ok(DerElement::constructed(img4.tag(), children))
}

/// Return a new IMG4 with `im4p` added.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if `img4` or `im4p` has the wrong kind
/// - [`Error::Value`] if `img4` already carries an IM4P
pub fn append_im4p_to_img4(img4: &DerElement, im4p: &DerElement) -> Result<DerElement> {
    append(img4, im4p, ContainerKind::Im4p)
}

/// Return a new IMG4 with `im4m` added under `[0]`.
pub fn append_im4m_to_img4(img4: &DerElement, im4m: &DerElement) -> Result<DerElement> {
    append(img4, im4m, ContainerKind::Im4m)
}

/// Return a new IMG4 with `im4r` added under `[1]`.
pub fn append_im4r_to_img4(img4: &DerElement, im4r: &DerElement) -> Result<DerElement> {
    append(img4, im4r, ContainerKind::Im4r)
}

/// Kinds of the sub-containers an IMG4 carries, in canonical order.
pub fn summarize(img4: &DerElement) -> Result<Vec<ContainerKind>> {
    let mut present = Vec::new();
    for kind in [ContainerKind::Im4p, ContainerKind::Im4m, ContainerKind::Im4r] {
        if find_child(img4, kind)?.is_some() {
            present.push(kind);
        }
    }
    Ok(present)
}
