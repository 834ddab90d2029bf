//! End-to-end container scenarios: build every sub-container, serialize,
//! parse back and query through the public API.

use img4::container::property::property_entry;
use img4::container::{
    append_im4m_to_img4, append_im4p_to_img4, append_im4r_to_img4, generator_from_im4r,
    get_bncn_from_im4r, get_empty_im4p_container, get_empty_img4_container, get_im4m_from_img4,
    get_im4p_from_img4, get_im4r_from_generator, get_im4r_from_img4, get_name_for_sequence,
    is_im4m, is_im4p, is_im4r, is_img4, summarize,
};
use img4::crypto::{sha1, sha384};
use img4::der::DerElement;
use img4::manifest::{
    dgst_name_for_hash, get_im4p_sha1, get_im4p_sha384, get_val_from_im4m, im4m_contains_hash,
    is_generator_valid_for_im4m,
};
use img4::payload::{
    append_payload_to_im4p, build_kbag, get_kbag, get_payload_from_im4p, im4p_contains_kbag,
    Compression, KeyBag,
};
use img4::{ContainerKind, Error, FourCc};

const GENERATOR: u64 = 0x1111_1111_1111_1111;

fn kernel_bytes() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..2000u32 {
        data.extend_from_slice(&i.to_le_bytes());
        data.extend_from_slice(b"__TEXT_EXEC __text");
    }
    data
}

fn kernel_im4p(compression: Option<Compression>) -> DerElement {
    let empty = get_empty_im4p_container(FourCc(*b"krnl"), "KernelCache");
    append_payload_to_im4p(&empty, &kernel_bytes(), compression, None).unwrap()
}

/// Manifest binding `im4p` by SHA-384 and, optionally, a generator nonce.
fn manifest_for(im4p: &DerElement, nonce: Option<Vec<u8>>) -> DerElement {
    let mut manp = vec![property_entry(
        FourCc(*b"CHIP"),
        DerElement::integer(0x8020),
    )];
    if let Some(nonce) = nonce {
        manp.push(property_entry(FourCc::BNCH, DerElement::octet_string(nonce)));
    }
    let krnl = DerElement::set(vec![property_entry(
        FourCc::DGST,
        DerElement::octet_string(get_im4p_sha384(im4p).unwrap()),
    )]);
    let manb = DerElement::set(vec![
        property_entry(FourCc::MANP, DerElement::set(manp)),
        property_entry(FourCc(*b"krnl"), krnl),
    ]);

    DerElement::sequence(vec![
        DerElement::ia5_string(ContainerKind::Im4m.magic()),
        DerElement::integer(0),
        DerElement::set(vec![property_entry(FourCc::MANB, manb)]),
        DerElement::octet_string(vec![0; 256]),
        DerElement::sequence(vec![]),
    ])
}

#[test]
fn empty_img4_predicates() {
    let img4 = get_empty_img4_container();
    assert!(is_img4(&img4));
    assert!(!is_im4p(&img4));
    assert!(!is_im4m(&img4));
    assert!(!is_im4r(&img4));
    assert!(matches!(get_im4p_from_img4(&img4), Err(Error::NotFound(_))));
}

#[test]
fn append_order_does_not_matter() {
    let im4p = kernel_im4p(None);
    let im4m = manifest_for(&im4p, None);
    let empty = get_empty_img4_container();

    let a = append_im4m_to_img4(&append_im4p_to_img4(&empty, &im4p).unwrap(), &im4m).unwrap();
    let b = append_im4p_to_img4(&append_im4m_to_img4(&empty, &im4m).unwrap(), &im4p).unwrap();

    for img4 in [&a, &b] {
        assert_eq!(get_im4p_from_img4(img4).unwrap(), im4p);
        assert_eq!(get_im4m_from_img4(img4).unwrap(), im4m);
    }
    assert_eq!(a.encode(), b.encode());

    assert!(matches!(
        append_im4p_to_img4(&a, &im4p),
        Err(Error::Value(_))
    ));
}

#[test]
fn full_img4_round_trip() {
    let im4p = kernel_im4p(Some(Compression::Lzss));
    let nonce = sha384(&GENERATOR.to_le_bytes())[..32].to_vec();
    let im4m = manifest_for(&im4p, Some(nonce));
    let im4r = get_im4r_from_generator(GENERATOR);

    let mut img4 = get_empty_img4_container();
    img4 = append_im4r_to_img4(&img4, &im4r).unwrap();
    img4 = append_im4p_to_img4(&img4, &im4p).unwrap();
    img4 = append_im4m_to_img4(&img4, &im4m).unwrap();

    let bytes = img4.encode();
    assert_eq!(get_name_for_sequence(&bytes).unwrap(), ContainerKind::Img4);

    let parsed = DerElement::parse(&bytes).unwrap();
    assert_eq!(parsed.encode(), bytes);
    assert_eq!(
        summarize(&parsed).unwrap(),
        [ContainerKind::Im4p, ContainerKind::Im4m, ContainerKind::Im4r]
    );

    let im4p = get_im4p_from_img4(&parsed).unwrap();
    let im4m = get_im4m_from_img4(&parsed).unwrap();
    let im4r = get_im4r_from_img4(&parsed).unwrap();

    let payload = get_payload_from_im4p(&im4p, None, None).unwrap();
    assert_eq!(payload.data, kernel_bytes());
    assert_eq!(payload.compression, Some(Compression::Lzss));

    let digest = get_im4p_sha384(&im4p).unwrap();
    assert!(im4m_contains_hash(&im4m, &digest).unwrap());
    assert_eq!(dgst_name_for_hash(&im4m, &digest).unwrap(), FourCc(*b"krnl"));
    assert_eq!(
        get_val_from_im4m(&im4m, FourCc(*b"CHIP")).unwrap().as_u64().unwrap(),
        0x8020
    );

    let generator = generator_from_im4r(&im4r).unwrap();
    assert_eq!(generator, GENERATOR);
    assert!(is_generator_valid_for_im4m(&im4m, generator).unwrap());
}

#[test]
fn digest_is_over_whole_im4p() {
    let im4p = kernel_im4p(None);
    assert_eq!(get_im4p_sha1(&im4p).unwrap(), sha1(&im4p.encode()));
    assert_ne!(get_im4p_sha1(&im4p).unwrap(), sha1(&kernel_bytes()));

    let im4m = manifest_for(&im4p, None);
    let other = kernel_im4p(Some(Compression::Lzfse));
    assert!(!im4m_contains_hash(&im4m, &get_im4p_sha384(&other).unwrap()).unwrap());
}

#[test]
fn generator_without_binding() {
    let im4m = manifest_for(&kernel_im4p(None), None);
    assert!(!is_generator_valid_for_im4m(&im4m, GENERATOR).unwrap());
}

#[test]
fn bncn_edge_values() {
    for generator in [0, u64::MAX] {
        let im4r = get_im4r_from_generator(generator);
        let parsed = DerElement::parse(&im4r.encode()).unwrap();
        let bncn = get_bncn_from_im4r(&parsed).unwrap();
        assert_eq!(bncn.payload().unwrap(), generator.to_be_bytes());
    }
}

#[test]
fn kbag_access() {
    let im4p = kernel_im4p(None);
    assert!(!im4p_contains_kbag(&im4p).unwrap());
    assert!(matches!(get_kbag(&im4p, 0), Err(Error::Value(_))));

    let bags = [1, 2].map(|kind| KeyBag {
        kind,
        iv: vec![kind as u8; 16],
        key: vec![0xee; 32],
    });
    let mut children = im4p.into_children().unwrap();
    children.push(build_kbag(&bags));
    let parsed = DerElement::parse(&DerElement::sequence(children).encode()).unwrap();

    assert!(im4p_contains_kbag(&parsed).unwrap());
    for n in 0..2 {
        let hex = get_kbag(&parsed, n).unwrap();
        assert!(!hex.is_empty());
        assert_eq!(hex.len() % 2, 0);
    }
    assert!(matches!(get_kbag(&parsed, 2), Err(Error::Value(_))));
}

#[test]
fn lzfse_payload_round_trip() {
    let im4p = kernel_im4p(Some(Compression::Lzfse));
    let parsed = DerElement::parse(&im4p.encode()).unwrap();
    let payload = get_payload_from_im4p(&parsed, None, None).unwrap();
    assert_eq!(payload.data, kernel_bytes());
    assert_eq!(payload.compression, Some(Compression::Lzfse));
}
