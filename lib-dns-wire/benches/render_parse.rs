use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use dns_wire::message::types::{
    Message, Question, RdataClass, RdataType, RecordData, ResourceRecord,
};
use dns_wire::name::Name;
use dns_wire::renderer::{Renderer, Section};

fn name(text: &str) -> Name {
    Name::from_text(text, None).unwrap()
}

fn question(text: &str, rdtype: RdataType) -> Question {
    Question {
        name: name(text),
        rdtype,
        rdclass: RdataClass::IN,
    }
}

fn a_record(owner: &str, address: &str) -> ResourceRecord {
    ResourceRecord {
        name: name(owner),
        rdata: RecordData::A {
            address: address.parse().unwrap(),
        },
        rclass: RdataClass::IN,
        ttl: 300,
    }
}

#[allow(non_snake_case)]
fn bench__render__query(c: &mut Criterion) {
    c.bench_function("render/query", |b| {
        b.iter(|| {
            let mut r = Renderer::new(Some(1234), 0x0100, 512, None);
            r.add_question(&question("www.example.com.", RdataType::A))
                .unwrap();
            r.add_edns(0, 0, 1232, Vec::new()).unwrap();
            r.write_header();
            r.into_wire()
        })
    });
}

#[allow(non_snake_case)]
fn bench__render__response_with_compression(c: &mut Criterion) {
    c.bench_function("render/response", |b| {
        b.iter(|| {
            let mut r = Renderer::new(Some(1234), 0x8180, 4096, None);
            r.add_question(&question("www.example.com.", RdataType::A))
                .unwrap();
            for i in 0..10 {
                r.add_rr(
                    Section::Answer,
                    &a_record("www.example.com.", &format!("10.0.0.{i}")),
                )
                .unwrap();
            }
            r.write_header();
            r.into_wire()
        })
    });
}

#[allow(non_snake_case)]
fn bench__parse__response(c: &mut Criterion) {
    let mut message =
        Message::from_question(1234, question("www.example.com.", RdataType::A)).make_response();
    for i in 0..10 {
        message
            .answers
            .push(a_record("www.example.com.", &format!("10.0.0.{i}")));
    }
    let octets = message.to_octets().unwrap();

    c.bench_function("parse/response", |b| {
        b.iter(|| Message::from_octets(black_box(&octets)))
    });
}

#[allow(non_snake_case)]
fn bench__round_trip__message(c: &mut Criterion) {
    let mut message =
        Message::from_question(1234, question("www.example.com.", RdataType::ANY)).make_response();
    message.answers.push(a_record("www.example.com.", "10.0.0.1"));
    message.answers.push(a_record("www.example.com.", "10.0.0.2"));

    c.bench_function("round_trip/message", |b| {
        b.iter_batched(
            || message.clone(),
            |message| {
                let octets = message.to_octets().unwrap();
                Message::from_octets(&octets).unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench__render__query,
    bench__render__response_with_compression,
    bench__parse__response,
    bench__round_trip__message
);
criterion_main!(benches);
