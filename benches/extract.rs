//! Benchmark: walk vs extract vs extract_generator vs construct over a synthetic
//! publications-file-like document (a header followed by many publication records).
//! Walk only reads headers; extract decodes from an in-memory tree; extract_generator
//! pulls top-level TLVs from a `TlvReader` over the same bytes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ksitlv::value::{Imprint, Utf8String};
use ksitlv::{
    construct, extract, extract_generator, tlv_template, Context, Flags, Tlv, TlvObject, TlvReader, TlvWalker,
};

#[derive(Debug, Default)]
struct PublicationData {
    time: Option<u64>,
    imprint: Option<Imprint>,
}

tlv_template! {
    PublicationData = "PublicationData" {
        native_int(0x02, Flags::NONE, |p| p.time, |p, v| p.time = Some(v));
        object(0x04, Flags::NONE, |p| p.imprint.as_ref(), |p, v| p.imprint = Some(v));
    }
}

#[derive(Debug, Default)]
struct PublicationRecord {
    data: Option<PublicationData>,
    refs: Option<Vec<Utf8String>>,
}

tlv_template! {
    PublicationRecord = "PublicationRecord" {
        composite(0x10, Flags::NONE, |r| r.data.as_ref(), |r, v| r.data = Some(v));
        object_list(0x09, Flags::NONE, |r| r.refs.as_ref(), |r| &mut r.refs);
    }
}

#[derive(Debug, Default)]
struct PublicationsFile {
    created: Option<u64>,
    records: Option<Vec<PublicationRecord>>,
}

tlv_template! {
    PublicationsFile = "PublicationsFile" {
        native_int(0x0701, Flags::NONE, |f| f.created, |f, v| f.created = Some(v));
        composite_list(0x0703, Flags::NONE, |f| f.records.as_ref(), |f| &mut f.records);
    }
}

/// Returns the object, its encoded tree and the top-level children serialised back to back.
/// 400 records keep the whole document under the TLV16 payload limit.
fn build_document(records: usize) -> (PublicationsFile, Tlv, Vec<u8>) {
    let mut doc = PublicationsFile { created: Some(1_700_000_000), records: Some(Vec::new()) };
    for i in 0..records {
        let rec = PublicationRecord {
            data: Some(PublicationData {
                time: Some(1_200_000_000 + i as u64 * 86_400),
                imprint: Some(Imprint::new(0x01, &[i as u8; 32]).unwrap()),
            }),
            refs: Some(vec![
                Utf8String::new("ref: Financial Times, ISSN: 0307-1766").unwrap(),
                Utf8String::new("https://doi.org/10.0000/example").unwrap(),
            ]),
        };
        if let Some(list) = doc.records.as_mut() {
            list.push(rec);
        }
    }
    let mut ctx = Context::new();
    let mut root = Tlv::new(0, false, false);
    construct(&mut ctx, &mut root, &doc, PublicationsFile::template()).unwrap();
    // Top-level children only: the stream form of a publications file body.
    let mut bytes = Vec::new();
    for child in root.children().unwrap().iter() {
        child.write_to(&mut bytes).unwrap();
    }
    (doc, root, bytes)
}

fn bench_extract(c: &mut Criterion) {
    let (doc, tree, bytes) = build_document(400);
    eprintln!("extract: {} bytes, 400 records", bytes.len());

    c.bench_function("walk_top_level", |b| {
        b.iter(|| black_box(TlvWalker::new(&bytes).filter(|r| r.is_ok()).count()))
    });

    c.bench_function("extract_tree", |b| {
        b.iter(|| {
            // Fresh raw tree each time so child parsing is measured.
            let raw = Tlv::raw(0, false, false, bytes.clone());
            let mut ctx = Context::new();
            let mut out = PublicationsFile::default();
            extract(&mut ctx, &mut out, &raw, PublicationsFile::template(), None).unwrap();
            black_box(out.records.map(|r| r.len()))
        })
    });

    c.bench_function("extract_generator_reader", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            let mut out = PublicationsFile::default();
            extract_generator(&mut ctx, &mut out, TlvReader::new(&bytes[..]), PublicationsFile::template(), None)
                .unwrap();
            black_box(out.records.map(|r| r.len()))
        })
    });

    c.bench_function("construct", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            let mut root = Tlv::new(0, false, false);
            construct(&mut ctx, &mut root, &doc, PublicationsFile::template()).unwrap();
            black_box(root.serialize().unwrap().len())
        })
    });

    c.bench_function("serialize_tree", |b| b.iter(|| black_box(tree.serialize().unwrap().len())));
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
