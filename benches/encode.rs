use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;

use tickflux::annotated;
use tickflux::decode::{merge_rows, Grouping};
use tickflux::market::synthetic_candles;
use tickflux::{BinanceAsset, Precision, Record};

fn candle_csv(candles: &[BinanceAsset]) -> String {
    let mut out = String::from(
        "#datatype,string,long,dateTime:RFC3339,double,string,string,string\r\n\
         #group,false,false,false,false,true,true,true\r\n\
         #default,_result,,,,,,\r\n\
         ,result,table,_time,_value,_field,_measurement,symbol\r\n",
    );
    for candle in candles {
        let time = candle.time.format(&Rfc3339).expect("format");
        for (field, value) in [
            ("open", candle.open),
            ("close", candle.close),
            ("high", candle.high),
            ("low", candle.low),
        ] {
            out.push_str(&format!(
                ",,0,{time},{value},{field},binance,{}\r\n",
                candle.symbol
            ));
        }
    }
    out
}

fn bench_line_protocol(c: &mut Criterion) {
    let end = datetime!(2023-03-23 16:10 UTC);
    let candles =
        synthetic_candles("BTCUSDT", 1_000, end, Duration::from_secs(60)).expect("candles");
    let points: Vec<_> = candles.iter().map(Record::to_point).collect();

    let mut group = c.benchmark_group("line_protocol");
    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("candles", |b| {
        b.iter(|| {
            for point in &points {
                black_box(point.to_line(Precision::Nanoseconds).expect("encode"));
            }
        });
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let end = datetime!(2023-03-23 16:10 UTC);
    let mut group = c.benchmark_group("decode");
    for &count in &[10_usize, 1_000] {
        let candles =
            synthetic_candles("BTCUSDT", count, end, Duration::from_secs(60)).expect("candles");
        let body = candle_csv(&candles);
        group.throughput(Throughput::Elements((count * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &body, |b, body| {
            b.iter(|| {
                let rows = annotated::parse(black_box(body)).expect("parse");
                black_box(merge_rows::<BinanceAsset, _>(rows, Grouping::Identity))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_line_protocol, bench_decode);
criterion_main!(benches);
