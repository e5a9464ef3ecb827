// Serialization followed by parsing reproduces every structurally
// significant field of a representative message corpus.

use sipflow_sip_core::prelude::*;

const CORPUS: &[&str] = &[
    // INVITE with Via chain, Route, Record-Route, Contact and a body
    "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
     Via: SIP/2.0/UDP proxy.atlanta.example.com:5060;branch=z9hG4bK2d4790.1;received=192.0.2.111\r\n\
     Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK74bf9;rport=5060\r\n\
     Max-Forwards: 69\r\n\
     Route: <sip:p1.example.com;lr>, <sip:p2.example.com;lr>\r\n\
     Record-Route: <sip:proxy.atlanta.example.com;lr>\r\n\
     To: Bob <sip:bob@biloxi.example.com>\r\n\
     From: \"Alice A.\" <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 INVITE\r\n\
     Contact: <sip:alice@client.atlanta.example.com;transport=tcp>\r\n\
     Content-Type: application/sdp\r\n\
     Content-Length: 27\r\n\
     \r\n\
     v=0\r\no=alice 1 1 IN IP4 x\r\n",
    // BYE inside a dialog
    "BYE sip:alice@client.atlanta.example.com SIP/2.0\r\n\
     Via: SIP/2.0/TCP client.biloxi.example.com:5060;branch=z9hG4bKnashds7\r\n\
     Max-Forwards: 70\r\n\
     Route: <sip:proxy.atlanta.example.com;lr>\r\n\
     From: Bob <sip:bob@biloxi.example.com>;tag=8321234356\r\n\
     To: \"Alice A.\" <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 BYE\r\n\
     Content-Length: 0\r\n\r\n",
    // 2xx response
    "SIP/2.0 200 OK\r\n\
     Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK74bf9;received=192.0.2.101\r\n\
     Record-Route: <sip:p2.example.com;lr>\r\n\
     Record-Route: <sip:p1.example.com;lr>\r\n\
     To: Bob <sip:bob@biloxi.example.com>;tag=8321234356\r\n\
     From: Alice <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 INVITE\r\n\
     Contact: <sip:bob@client.biloxi.example.com;transport=tcp>\r\n\
     Content-Length: 0\r\n\r\n",
    // non-2xx response with custom reason
    "SIP/2.0 486 Busy Here Right Now\r\n\
     Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK74bf9\r\n\
     To: Bob <sip:bob@biloxi.example.com>;tag=314159\r\n\
     From: Alice <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 INVITE\r\n\
     Content-Length: 0\r\n\r\n",
    // ACK for a non-2xx (same branch as the INVITE)
    "ACK sip:bob@biloxi.example.com SIP/2.0\r\n\
     Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK74bf9\r\n\
     Max-Forwards: 70\r\n\
     To: Bob <sip:bob@biloxi.example.com>;tag=314159\r\n\
     From: Alice <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 ACK\r\n\
     Content-Length: 0\r\n\r\n",
    // ACK for a 2xx, routed, with its own branch
    "ACK sip:bob@client.biloxi.example.com;transport=tcp SIP/2.0\r\n\
     Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bKnew1\r\n\
     Route: <sip:p1.example.com;lr>\r\n\
     Route: <sip:p2.example.com;lr>\r\n\
     Max-Forwards: 70\r\n\
     To: Bob <sip:bob@biloxi.example.com>;tag=8321234356\r\n\
     From: Alice <sip:alice@atlanta.example.com>;tag=9fxced76sl\r\n\
     Call-ID: 3848276298220188511@atlanta.example.com\r\n\
     CSeq: 1 ACK\r\n\
     Content-Length: 0\r\n\r\n",
    // compact forms, unknown header, IPv6
    "MESSAGE sip:user@[2001:db8::1] SIP/2.0\r\n\
     v: SIP/2.0/UDP [2001:db8::2]:5060;branch=z9hG4bKm1\r\n\
     f: <sip:me@[2001:db8::2]>;tag=m1\r\n\
     t: <sip:user@[2001:db8::1]>\r\n\
     i: msg-1\r\n\
     CSeq: 7 MESSAGE\r\n\
     X-Custom-Thing: some value; with=params\r\n\
     c: text/plain\r\n\
     l: 5\r\n\r\n\
     hello",
];

#[test]
fn test_serialize_then_parse_is_identity() {
    for text in CORPUS {
        let original = Message::parse(text.as_bytes())
            .unwrap_or_else(|e| panic!("corpus entry failed to parse: {}\n{}", e, text));
        let wire = original.to_bytes();
        let reparsed = Message::parse(&wire)
            .unwrap_or_else(|e| panic!("serialized form failed to parse: {}\n{}", e, original));
        assert_eq!(original, reparsed, "round trip changed:\n{}", text);
    }
}

#[test]
fn test_structural_fields_survive() {
    let original = Message::parse(CORPUS[0].as_bytes()).unwrap();
    let reparsed = Message::parse(&original.to_bytes()).unwrap();

    let a = original.as_request().unwrap();
    let b = reparsed.as_request().unwrap();
    assert_eq!(a.method, b.method);
    assert_eq!(a.uri, b.uri);
    assert_eq!(a.body, b.body);
    assert_eq!(b.body.len(), 27);
    assert_eq!(original.vias().unwrap(), reparsed.vias().unwrap());
    assert_eq!(original.routes().unwrap(), reparsed.routes().unwrap());
    assert_eq!(original.record_routes().unwrap(), reparsed.record_routes().unwrap());
    assert_eq!(original.contact(), reparsed.contact());
    assert_eq!(
        original.from_address().unwrap().display_name.as_deref(),
        Some("Alice A.")
    );
}

#[test]
fn test_programmatic_message_round_trips() {
    let request = SimpleRequestBuilder::new(Method::Invite, "sip:bob@biloxi.example.com")
        .unwrap()
        .from("Alice", "sip:alice@atlanta.example.com", Some("1928301774"))
        .unwrap()
        .to("Bob", "sip:bob@biloxi.example.com", None)
        .unwrap()
        .call_id("a84b4c76e66710")
        .cseq(314159)
        .via("SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds".parse().unwrap())
        .max_forwards(70)
        .body("application/sdp", "v=0\r\n")
        .build();

    let first = Message::parse(&request.to_bytes()).unwrap();
    let second = Message::parse(&first.to_bytes()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.body().as_ref(), b"v=0\r\n");
}
