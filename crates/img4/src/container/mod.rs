//! IMG4 container algebra
//!
//! Type predicates, extraction and composition of IMG4 / IM4P / IM4M / IM4R /
//! IM4C containers, built purely on the [`crate::der`] engine.

pub mod fourcc;
pub mod im4p;
pub mod im4r;
pub mod img4;
pub mod kind;
pub mod property;

pub use fourcc::FourCc;
pub use im4p::{get_desc_from_im4p, get_empty_im4p_container, get_type_from_im4p, rename_im4p};
pub use im4r::{
    gen_priv_tag_for_number_with_payload, generator_from_im4r, get_bncn_from_im4r,
    get_im4r_from_generator, get_im4r_with_elements,
};
pub use img4::{
    append_im4m_to_img4, append_im4p_to_img4, append_im4r_to_img4, get_empty_img4_container,
    get_im4m_from_img4, get_im4p_from_img4, get_im4r_from_img4, summarize,
};
pub use kind::{get_name_for_sequence, is_im4c, is_im4m, is_im4p, is_im4r, is_img4, ContainerKind};
