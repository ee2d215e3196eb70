#![expect(missing_docs)]

use std::{cell::RefCell, fmt::Write, rc::Rc};

use utf8flow::{
    AdaptiveOptions, ByteView, CodePoint, EncoderOptions, ManualClock, PipelineOptions, Progress,
    SliceSource, TracingSink, TranscodePipeline,
};

/// Run `input` through a pipeline and log every observable event in order.
fn render_events(input: &'static [u8], chunk_size: usize, output_capacity: usize) -> String {
    let options = PipelineOptions {
        source: AdaptiveOptions {
            chunk_size,
            ..AdaptiveOptions::default()
        },
        encoder: EncoderOptions { output_capacity },
    };
    let mut pipeline = TranscodePipeline::new(
        SliceSource::new(input),
        ManualClock::new(),
        &options,
        TracingSink,
    )
    .expect("valid options");

    let log = Rc::new(RefCell::new(String::new()));
    {
        let log = Rc::clone(&log);
        pipeline.connect_code_points(move |cp: CodePoint| {
            writeln!(log.borrow_mut(), "cp U+{:04X} {cp}", cp.value()).unwrap();
        });
    }
    {
        let log = Rc::clone(&log);
        pipeline.connect_output(move |chunk: ByteView| {
            writeln!(log.borrow_mut(), "chunk {:02X?}", chunk.as_bytes()).unwrap();
        });
    }
    {
        let log = Rc::clone(&log);
        pipeline.on_progress(move |p: &Progress| {
            writeln!(
                log.borrow_mut(),
                "progress {}/{}",
                p.bytes_consumed,
                p.total.unwrap_or_default()
            )
            .unwrap();
        });
    }
    {
        let log = Rc::clone(&log);
        pipeline.on_finished(move || log.borrow_mut().push_str("finished\n"));
    }

    pipeline.run_to_completion();
    log.take()
}

#[test]
fn snapshot_split_sequences() {
    insta::assert_snapshot!(render_events("Hé€".as_bytes(), 2, 4), @r"
    cp U+0048 H
    progress 2/6
    cp U+00E9 é
    progress 4/6
    chunk [48, C3, A9, E2]
    cp U+20AC €
    progress 6/6
    chunk [82, AC]
    finished
    ");
}

#[test]
fn snapshot_malformed_input() {
    insta::assert_snapshot!(render_events(b"a\xFF\xE2(b", 3, 16), @r"
    cp U+0061 a
    cp U+FFFD �
    progress 3/5
    cp U+FFFD �
    cp U+0062 b
    progress 5/5
    chunk [61, EF, BF, BD, EF, BF, BD, 62]
    finished
    ");
}
