//! Lowering tests: generated Rust text for every construct, emission order, naming, and
//! unsupported constructs.

use tlspl::ast::*;
use tlspl::{
    compile, parse, CodeGen, Error, GenOptions, NamingScheme, UnsupportedConstructError,
};

fn rust(src: &str) -> String {
    compile(src, &GenOptions::default()).expect("compile")
}

fn rust_with(src: &str, options: GenOptions) -> String {
    compile(src, &options).expect("compile")
}

fn verbatim() -> GenOptions {
    GenOptions {
        escape_keywords: false,
        ..GenOptions::default()
    }
}

// ==================== Structures ====================

#[test]
fn named_struct() {
    let src = "struct {\n  T1 f1;\n  T2 f2;\n  Tn fn;\n} T;";
    assert_eq!(
        rust_with(src, verbatim()),
        "struct T {\n    f1: T1,\n    f2: T2,\n    fn: Tn,\n}"
    );
    assert_eq!(rust(src), "struct T {\n    f1: T1,\n    f2: T2,\n    r#fn: Tn,\n}");
}

#[test]
fn empty_structs_have_empty_bodies() {
    assert_eq!(rust("struct {};"), "struct Container {}");
    assert_eq!(rust("struct {} HelloRequest;"), "struct HelloRequest {}");
    assert_eq!(
        rust("struct { struct {}; } Outer;"),
        "struct OuterContainer {}\n\nstruct Outer {\n    container: OuterContainer,\n}"
    );
}

#[test]
fn keyword_field_names_are_raw() {
    let src = "struct { ContentType type; ProtocolVersion version; } TLSPlaintext;";
    assert_eq!(
        rust(src),
        "struct TLSPlaintext {\n    r#type: ContentType,\n    version: ProtocolVersion,\n}"
    );
}

#[test]
fn top_level_fields_follow_definitions() {
    let src = "uint16 count;\nstruct { uint8 a; } A;\nopaque random_bytes[28];";
    assert_eq!(
        rust(src),
        "struct A {\n    a: u8,\n}\n\ncount: u16\nrandom_bytes: [u8; 28]"
    );
}

// ==================== Enumerateds ====================

#[test]
fn external_enum() {
    assert_eq!(
        rust("enum { red(3), blue(5), white(7) } Color;"),
        "enum Color {\n    red = 3,\n    blue = 5,\n    white = 7,\n}"
    );
}

#[test]
fn external_enum_width_becomes_repr_hint() {
    let src = "enum { sweet(1), sour(2), bitter(4), (32000) } Taste;";
    assert_eq!(
        rust(src),
        "#[repr(u16)]\nenum Taste {\n    sweet = 1,\n    sour = 2,\n    bitter = 4,\n}"
    );
    let plain = GenOptions {
        enum_width_hints: false,
        ..GenOptions::default()
    };
    assert_eq!(
        rust_with(src, plain),
        "enum Taste {\n    sweet = 1,\n    sour = 2,\n    bitter = 4,\n}"
    );
}

#[test]
fn repr_hint_covers_largest_member() {
    let src = "enum { small(1), huge(70000), (255) } Mixed;";
    assert!(rust(src).starts_with("#[repr(u32)]\nenum Mixed {"));
}

#[test]
fn external_enum_members_match_entries() {
    let src = "enum { a(10), b(0), c(65535), d(2) } Order;";
    let defs = parse(src).expect("parse");
    let Declaration::ExternalEnum(e) = &defs.declarations[0] else {
        panic!("expected external enum");
    };
    let out = rust(src);
    let members: Vec<&str> = out
        .lines()
        .filter(|l| l.starts_with("    "))
        .map(|l| l.trim().trim_end_matches(','))
        .collect();
    assert_eq!(members.len(), e.entries.len());
    for (member, entry) in members.iter().zip(&e.entries) {
        assert_eq!(*member, format!("{} = {}", entry.name, entry.value));
    }
}

#[test]
fn internal_enum() {
    assert_eq!(
        rust("enum { low, medium, high } Amount;"),
        "enum Amount {\n    low,\n    medium,\n    high,\n}"
    );
}

// ==================== Vectors ====================

#[test]
fn constant_vectors() {
    assert_eq!(rust("opaque Datum[3];"), "Datum: [u8; 3]");
    assert_eq!(rust("Datum Data[3];"), "Data: [Datum; 3]");
}

#[test]
fn variable_vectors() {
    assert_eq!(rust("uint8 Data<3..10>;"), "Data: Vec<u8>");
    assert_eq!(rust("opaque mandatory<300..400>;"), "mandatory: Vec<u8>");
    assert_eq!(rust("uint16 longer<0..800>;"), "longer: Vec<u16>");
    assert_eq!(rust("Extension extensions<0..2^16-1>;"), "extensions: Vec<Extension>");
}

// ==================== Variants ====================

#[test]
fn variant_with_fallthrough() {
    let src = r#"struct {
      select (VariantTag) {
          case apple:
            V1;
          case orange:
          case banana:
            V2;
      } variant_body;
    } VariantRecord;"#;
    assert_eq!(
        rust(src),
        "enum VariantRecordVariant {\n    apple(V1),\n    orange(V2),\n    banana(V2),\n}\n\n\
         struct VariantRecord {\n    variant_body: VariantRecordVariant,\n}"
    );
}

#[test]
fn handshake_variant() {
    let src = r#"
      struct {
          HandshakeType msg_type;
          uint24 length;
          select (HandshakeType) {
              case hello_request:       HelloRequest;
              case client_hello:        ClientHello;
              case server_hello:        ServerHello;
              case certificate:         Certificate;
              case server_key_exchange: ServerKeyExchange;
              case certificate_request: CertificateRequest;
              case server_hello_done:   ServerHelloDone;
              case certificate_verify:  CertificateVerify;
              case client_key_exchange: ClientKeyExchange;
              case finished:            Finished;
          } body;
      } Handshake;
    "#;
    let expected = "enum HandshakeVariant {
    hello_request(HelloRequest),
    client_hello(ClientHello),
    server_hello(ServerHello),
    certificate(Certificate),
    server_key_exchange(ServerKeyExchange),
    certificate_request(CertificateRequest),
    server_hello_done(ServerHelloDone),
    certificate_verify(CertificateVerify),
    client_key_exchange(ClientKeyExchange),
    finished(Finished),
}

struct Handshake {
    msg_type: HandshakeType,
    length: u24,
    body: HandshakeVariant,
}";
    assert_eq!(rust(src), expected);
}

#[test]
fn fallthrough_groups_expand_in_label_order() {
    let src = r#"struct {
        select (Kind) {
            case a: case b: case c: Shared;
            case d: Single;
            case e: case f: uint16;
        } body;
    } Msg;"#;
    let out = rust(src);
    let arms: Vec<&str> = out
        .lines()
        .skip_while(|l| !l.starts_with("enum MsgVariant"))
        .skip(1)
        .take_while(|l| *l != "}")
        .map(str::trim)
        .collect();
    assert_eq!(
        arms,
        ["a(Shared),", "b(Shared),", "c(Shared),", "d(Single),", "e(u16),", "f(u16),"]
    );
}

#[test]
fn anonymous_struct_with_variant_uses_synthesized_name() {
    let src = "struct { uint8 tag; select (T) { case x: X; } body; };";
    assert_eq!(
        rust(src),
        "enum ContainerVariant {\n    x(X),\n}\n\nstruct Container {\n    tag: u8,\n    body: ContainerVariant,\n}"
    );
}

// ==================== Cryptographic attributes ====================

#[test]
fn unnamed_crypto_struct() {
    let src = r#"
          digitally-signed struct {
            uint8 field3<0..255>;
            uint8 field4;
          };
    "#;
    assert_eq!(rust(src), "struct Signed {\n    field3: Vec<u8>,\n    field4: u8,\n}");
}

#[test]
fn named_crypto_struct() {
    let src = r#"
      stream-ciphered struct {
          uint8 field1;
          uint8 field2;
          digitally-signed struct {
            uint8 field3<0..255>;
            uint8 field4;
          };
      } UserType;
    "#;
    let expected = "struct UserTypeSigned {
    field3: Vec<u8>,
    field4: u8,
}

struct UserType {
    field1: u8,
    field2: u8,
    signed: DigitallySigned<UserTypeSigned>,
}";
    assert_eq!(rust(src), expected);
}

#[test]
fn crypto_containers_per_attribute() {
    let cases = [
        ("digitally-signed", "signed: DigitallySigned<RecSigned>"),
        ("stream-ciphered", "ciphered: StreamCiphered<RecCiphered>"),
        ("block-ciphered", "ciphered: BlockCiphered<RecCiphered>"),
        ("aead-ciphered", "ciphered: AeadCiphered<RecCiphered>"),
        ("public-key-encrypted", "encrypted: RecEncrypted"),
    ];
    for (keyword, field) in cases {
        let src = format!("struct {{ {} struct {{ uint8 x; }}; }} Rec;", keyword);
        let out = rust(&src);
        assert!(out.contains(&format!("    {},\n", field)), "{}:\n{}", keyword, out);
    }
}

#[test]
fn named_nested_crypto_struct_is_wrapped_at_reference() {
    let src = r#"struct {
        ServerDHParams params;
        digitally-signed struct {
            opaque client_random[32];
            opaque server_random[32];
        } signed_params;
    } ServerKeyExchange;"#;
    let expected = "struct signed_params {
    client_random: [u8; 32],
    server_random: [u8; 32],
}

struct ServerKeyExchange {
    params: ServerDHParams,
    signed_params: DigitallySigned<signed_params>,
}";
    assert_eq!(rust(src), expected);
}

// ==================== Naming of nested anonymous structures ====================

const DEEP: &str = r#"
struct {
    digitally-signed struct {
        struct { uint8 a; };
    };
} Outer;
"#;

#[test]
fn full_path_names_follow_ancestor_chain() {
    let expected = "struct OuterSignedContainer {
    a: u8,
}

struct OuterSigned {
    container: OuterSignedContainer,
}

struct Outer {
    signed: DigitallySigned<OuterSigned>,
}";
    assert_eq!(rust(DEEP), expected);
}

#[test]
fn shallow_names_use_immediate_parent_only() {
    let shallow = GenOptions {
        naming: NamingScheme::Shallow,
        ..GenOptions::default()
    };
    let expected = "struct SignedContainer {
    a: u8,
}

struct OuterSigned {
    container: SignedContainer,
}

struct Outer {
    signed: DigitallySigned<OuterSigned>,
}";
    assert_eq!(rust_with(DEEP, shallow), expected);
}

#[test]
fn named_ancestor_restarts_the_chain() {
    let src = "struct { struct { struct { uint8 a; }; } Middle; } Outer;";
    let out = rust(src);
    assert!(out.starts_with("struct MiddleContainer {"), "{}", out);
    assert!(out.contains("    container: MiddleContainer,\n"));
    assert!(out.contains("    Middle: Middle,\n"));
}

// ==================== Ordering and determinism ====================

const PROTOCOL: &str = r#"
enum { hello_request(0), client_hello(1), (255) } HandshakeType;

struct {
    uint8 major;
    uint8 minor;
} ProtocolVersion;

stream-ciphered struct {
    ProtocolVersion client_version;
    struct {
        uint32 gmt_unix_time;
        opaque random_bytes[28];
    };
    digitally-signed struct {
        opaque session_id<0..32>;
        block-ciphered struct {
            uint16 cipher_suites<2..2^16-2>;
        };
    };
    select (HandshakeType) {
        case hello_request: HelloRequest;
        case client_hello: ClientHello;
    } body;
} Hello;
"#;

#[test]
fn definitions_precede_references() {
    let out = rust(PROTOCOL);
    let defined = |name: &str| {
        ["struct ", "enum "]
            .iter()
            .filter_map(|kw| out.find(&format!("{}{} {{", kw, name)))
            .min()
            .unwrap_or_else(|| panic!("{} not defined in:\n{}", name, out))
    };
    let first_use = |name: &str| {
        out.find(&format!(": {},", name))
            .or_else(|| out.find(&format!("<{}>", name)))
            .unwrap_or_else(|| panic!("{} not referenced in:\n{}", name, out))
    };
    for name in [
        "HelloContainer",
        "HelloSigned",
        "HelloSignedCiphered",
        "HelloVariant",
    ] {
        assert!(defined(name) < first_use(name), "{} used before definition:\n{}", name, out);
    }
    assert!(out.contains("    container: HelloContainer,\n"));
    assert!(out.contains("    signed: DigitallySigned<HelloSigned>,\n"));
    assert!(out.contains("    ciphered: BlockCiphered<HelloSignedCiphered>,\n"));
    assert!(out.contains("    cipher_suites: Vec<u16>,\n"));
    assert!(out.starts_with("#[repr(u8)]\nenum HandshakeType {"));
}

#[test]
fn lowering_is_deterministic() {
    let defs = parse(PROTOCOL).expect("parse");
    let gen = CodeGen::new(GenOptions::default());
    let first = gen.lower(&defs).expect("lower");
    let second = gen.lower(&defs).expect("lower");
    assert_eq!(first, second);
    assert_eq!(first, rust(PROTOCOL));
}

#[test]
fn lower_declaration_returns_ordered_fragment() {
    let defs = parse(PROTOCOL).expect("parse");
    let fragment = CodeGen::default()
        .lower_declaration(&defs.declarations[2])
        .expect("lower");
    assert!(fragment.decl.is_empty());
    let heads: Vec<&str> = fragment
        .specs
        .iter()
        .filter_map(|s| s.lines().next())
        .collect();
    assert_eq!(
        heads,
        [
            "struct HelloContainer {",
            "struct HelloSignedCiphered {",
            "struct HelloSigned {",
            "enum HelloVariant {",
            "struct Hello {",
        ]
    );
}

// ==================== Unsupported constructs ====================

#[test]
fn crypto_scalar_field_is_unsupported() {
    let err = compile(
        "struct { public-key-encrypted PreMasterSecret pre_master_secret; } EncryptedPreMasterSecret;",
        &GenOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::Unsupported(UnsupportedConstructError::CryptographicField {
            field: "pre_master_secret".to_string(),
            attribute: CryptographicAttribute::PublicKeyEncrypted,
        })
    );
}

#[test]
fn unnamed_enum_is_unsupported() {
    let err = compile("enum { a(1), b(2) };", &GenOptions::default()).unwrap_err();
    assert_eq!(err, Error::Unsupported(UnsupportedConstructError::UnnamedEnum));
}

#[test]
fn enum_inside_structure_is_unsupported() {
    let mut defs = parse("struct { uint8 a; } Holder;").expect("parse");
    let inner = parse("enum { low, high } Level;").expect("parse");
    if let Declaration::NamedStructure(s) = &mut defs.declarations[0] {
        s.body.fields.declarations.push(inner.declarations[0].clone());
    }
    let err = CodeGen::default().lower(&defs).unwrap_err();
    assert_eq!(
        err,
        UnsupportedConstructError::NestedEnum {
            enumeration: "Level".to_string(),
            structure: "Holder".to_string(),
        }
    );
}

#[test]
fn unsupported_construct_yields_no_output() {
    let src = "struct { uint8 ok; } Fine;\nstruct { digitally-signed Thing t; } Broken;";
    assert!(matches!(
        compile(src, &GenOptions::default()),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn syntax_error_surfaces_through_compile() {
    assert!(matches!(
        compile("struct { uint8 a; ", &GenOptions::default()),
        Err(Error::Syntax(_))
    ));
}
