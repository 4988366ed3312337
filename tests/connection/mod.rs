//! End-to-end scenarios driving two `Connection`s against each other
//! by piping the bytes one emits into the other's `receive`.

use bytes::Bytes;
use h2_engine::{Config, Connection, Event, Header, Signal};
use std::cell::RefCell;
use std::rc::Rc;

fn init() {
    let _ = env_logger::try_init();
}

fn collect_bytes(conn: &mut Connection) -> Rc<RefCell<Vec<Bytes>>> {
    let out = Rc::new(RefCell::new(Vec::new()));
    let sink = out.clone();
    conn.subscribe(
        Signal::Frame,
        Box::new(move |event| {
            if let Event::Frame { bytes } = event {
                sink.borrow_mut().push(bytes.clone());
            }
        }),
    );
    out
}

fn pipe(from: &Rc<RefCell<Vec<Bytes>>>, to: &mut Connection) {
    for chunk in from.borrow_mut().drain(..) {
        to.receive(&chunk).unwrap();
    }
}

#[test]
fn client_get_and_server_response_round_trip() {
    init();
    let mut client = Connection::client(Config::default()).unwrap();
    let mut server = Connection::server(Config::default());

    let client_out = collect_bytes(&mut client);
    let server_out = collect_bytes(&mut server);

    let server_headers = Rc::new(RefCell::new(Vec::new()));
    let sh = server_headers.clone();
    server.subscribe(
        Signal::Headers,
        Box::new(move |event| {
            if let Event::Headers { stream_id, end_stream, .. } = event {
                sh.borrow_mut().push((*stream_id, *end_stream));
            }
        }),
    );

    let client_headers = Rc::new(RefCell::new(Vec::new()));
    let ch = client_headers.clone();
    client.subscribe(
        Signal::Headers,
        Box::new(move |event| {
            if let Event::Headers { stream_id, end_stream, .. } = event {
                ch.borrow_mut().push((*stream_id, *end_stream));
            }
        }),
    );

    let stream_id = client.open_stream();
    client
        .send_headers(
            stream_id,
            vec![
                Header::new(&b":method"[..], &b"GET"[..]),
                Header::new(&b":scheme"[..], &b"https"[..]),
                Header::new(&b":authority"[..], &b"example.com"[..]),
                Header::new(&b":path"[..], &b"/"[..]),
            ],
            true,
            true,
        )
        .unwrap();

    pipe(&client_out, &mut server);
    assert_eq!(server_headers.borrow().as_slice(), &[(stream_id, true)]);

    server
        .send_headers(
            stream_id,
            vec![
                Header::new(&b":status"[..], &b"200"[..]),
                Header::new(&b"content-length"[..], &b"0"[..]),
            ],
            true,
            true,
        )
        .unwrap();

    pipe(&server_out, &mut client);
    assert_eq!(client_headers.borrow().as_slice(), &[(stream_id, true)]);
}

#[test]
fn server_push_promise_is_observed_by_client() {
    init();
    let mut client = Connection::client(Config::default()).unwrap();
    let mut server = Connection::server(Config::default());

    let client_out = collect_bytes(&mut client);
    let server_out = collect_bytes(&mut server);

    let stream_id = client.open_stream();
    client
        .send_headers(
            stream_id,
            vec![
                Header::new(&b":method"[..], &b"GET"[..]),
                Header::new(&b":path"[..], &b"/index.html"[..]),
            ],
            true,
            true,
        )
        .unwrap();
    pipe(&client_out, &mut server);

    let promised = server.open_stream();
    server
        .send_push_promise(
            stream_id,
            promised,
            vec![
                Header::new(&b":method"[..], &b"GET"[..]),
                Header::new(&b":path"[..], &b"/style.css"[..]),
            ],
            true,
        )
        .unwrap();

    let promises = Rc::new(RefCell::new(Vec::new()));
    let p = promises.clone();
    client.subscribe(
        Signal::Promise,
        Box::new(move |event| {
            if let Event::Promise {
                stream_id,
                promised_stream_id,
            } = event
            {
                p.borrow_mut().push((*stream_id, *promised_stream_id));
            }
        }),
    );

    pipe(&server_out, &mut client);
    assert_eq!(promises.borrow().as_slice(), &[(stream_id, promised)]);
}

#[test]
fn repeated_header_shrinks_via_dynamic_table() {
    init();
    let mut client = Connection::client(Config::default()).unwrap();

    let headers = || {
        vec![
            Header::new(&b":method"[..], &b"GET"[..]),
            Header::new(&b":path"[..], &b"/"[..]),
            Header::new(&b"x-trace-id"[..], &b"abcdefghijklmnopqrstuvwxyz0123456789"[..]),
        ]
    };

    let first_out = collect_bytes(&mut client);
    let first = client.open_stream();
    client.send_headers(first, headers(), true, true).unwrap();
    let first_len: usize = first_out.borrow().iter().map(|b| b.len()).sum();

    let second_out = collect_bytes(&mut client);
    let second = client.open_stream();
    client.send_headers(second, headers(), true, true).unwrap();
    let second_len: usize = second_out.borrow().iter().map(|b| b.len()).sum();

    // The second request's custom header was indexed into the dynamic
    // table by the first, so its HEADERS frame is materially smaller.
    assert!(
        second_len < first_len,
        "expected second request to shrink via dynamic table: {first_len} vs {second_len}"
    );
}

#[test]
fn oversized_header_block_splits_across_continuation() {
    init();
    let mut client = Connection::client(Config::default()).unwrap();
    let client_out = collect_bytes(&mut client);

    let mut headers = vec![
        Header::new(&b":method"[..], &b"GET"[..]),
        Header::new(&b":path"[..], &b"/"[..]),
    ];
    for i in 0..800 {
        headers.push(Header::new(
            format!("x-custom-{i}").into_bytes(),
            format!("value-{i}-filler-filler-filler").into_bytes(),
        ));
    }

    let stream_id = client.open_stream();
    client.send_headers(stream_id, headers, true, true).unwrap();

    let frames = client_out.borrow();
    let header_frame_types: Vec<u8> = frames.iter().map(|b| b[3]).collect();
    assert!(header_frame_types.len() > 1, "expected the block to split");
    assert_eq!(header_frame_types[0], 0x1); // HEADERS
    assert!(header_frame_types[1..].iter().all(|&t| t == 0x9)); // CONTINUATION

    let last = frames.last().unwrap();
    assert_eq!(last[4] & 0x4, 0x4, "last frame must carry END_HEADERS");
    let earlier_end_headers_set = frames[..frames.len() - 1].iter().any(|f| f[4] & 0x4 != 0);
    assert!(!earlier_end_headers_set);
}
