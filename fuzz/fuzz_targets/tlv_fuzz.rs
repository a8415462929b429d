//! TLV fuzz target: parse arbitrary bytes, then run them through a nested template.
//! Nothing may panic; every failure must surface as a `KsiError`.
//! Build with: cargo fuzz run tlv_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
mod schema {
    use ksitlv::tlv_template;
    use ksitlv::value::{Imprint, OctetString, Utf8String};
    use ksitlv::{Flags, Tlv};

    #[derive(Default)]
    pub struct Inner {
        pub time: Option<u64>,
        pub imprint: Option<Imprint>,
        pub pos: Option<u64>,
    }

    tlv_template! {
        Inner = "Inner" {
            native_int(0x02, Flags::NONE, |s| s.time, |s, v| s.time = Some(v));
            object(0x04, Flags::NONE, |s| s.imprint.as_ref(), |s, v| s.imprint = Some(v));
            seek_pos(0x05, |s, v| s.pos = Some(v));
        }
    }

    #[derive(Default)]
    pub struct Outer {
        pub inner: Option<Inner>,
        pub names: Option<Vec<Utf8String>>,
        pub blobs: Option<Vec<OctetString>>,
        pub children: Option<Vec<Inner>>,
        pub raw: Option<Tlv>,
    }

    tlv_template! {
        Outer = "Outer" {
            composite(0x10, Flags::NONE, |s| s.inner.as_ref(), |s, v| s.inner = Some(v));
            object_list(0x09, Flags::NONE, |s| s.names.as_ref(), |s| &mut s.names);
            object_list(0x0a, Flags::NON_CRITICAL, |s| s.blobs.as_ref(), |s| &mut s.blobs);
            composite_list(0x11, Flags::NONE, |s| s.children.as_ref(), |s| &mut s.children);
            object(0x1f, Flags::FORWARD, |s| s.raw.as_ref(), |s, v| s.raw = Some(v));
        }
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use ksitlv::{decode_with_remainder, encode, Config, Context, Flags};

    let _ = ksitlv::walk::TlvWalker::new(data).count();
    let _ = ksitlv::TlvReader::new(data).count();
    let tlv = match ksitlv::Tlv::parse(data) {
        Ok(t) => t,
        Err(_) => return,
    };
    let _ = ksitlv::dump_tlv_expanded(&tlv, 16);

    let mut ctx = Context::with_config(Config::default().with_max_depth(16).with_max_nodes(4096));
    if let Ok((obj, _rest)) = decode_with_remainder::<schema::Outer>(&mut ctx, &tlv) {
        // Anything that decodes must encode again.
        let enc = encode(&mut ctx, &obj, tlv.tag(), Flags::NONE);
        assert!(enc.is_ok());
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run tlv_fuzz");
}
