//! Integration tests for the state demographics pipeline

use state_demographics::extractor::{group_into_lines, TextItem};
use state_demographics::normalize::GroupRow;
use state_demographics::output::OutputFiles;
use state_demographics::{
    analyze_pages, classify_line, compute_state_baselines, derive_blocks, extract_page_texts_mem,
    find_state_starts, flatten, normalize, parse_state_block, process_report_mem, segment_pages,
    write_outputs, GroupType, HeaderPattern, NumericValues, ReportConfig, ReportError,
};

fn pages(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

fn group_row(state: &'static str, total: f64, dem: f64) -> GroupRow {
    GroupRow {
        state,
        state_sample: Some(1000),
        group_type: GroupType::Misc,
        label: None,
        total_pct: Some(total),
        dem_pct: Some(dem),
        gop_pct: None,
        other_pct: None,
        source_line: format!("{}% {}%", total, dem),
    }
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_report_config_default() {
    let config = ReportConfig::default();
    assert_eq!(config.year, 2024);
    assert_eq!(config.report_title, "Presidential");
    assert_eq!(config.sample_scan_lines, 80);
    assert_eq!(config.rescale_tolerance, 95.0..=105.0);
    assert!(config.parallel);
}

#[test]
fn test_custom_header_title() {
    let config = ReportConfig {
        year: 2020,
        report_title: "Senate".to_string(),
        ..ReportConfig::default()
    };
    let header = HeaderPattern::new(&config);
    assert_eq!(header.captured_name("2020 Senate – Georgia"), Some("Georgia"));
    assert_eq!(header.captured_name("2024 Presidential – Georgia"), None);
}

// ============================================================================
// Segmentation Tests
// ============================================================================

#[test]
fn test_headers_partition_page_range() {
    let doc = pages(&[
        "Cover page",
        "2024 Presidential – Colorado\nSample Size: 800",
        "continued",
        "2024 Presidential – Delaware",
        "2024 Presidential – Florida",
        "appendix",
        "more appendix",
    ]);
    let starts = find_state_starts(&doc, &HeaderPattern::new(&ReportConfig::default()));
    assert_eq!(
        starts,
        vec![("Colorado", 1), ("Delaware", 3), ("Florida", 4)]
    );

    let blocks = derive_blocks(&starts, doc.len());
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].start_page(), 1);
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].pages.end, pair[1].pages.start);
    }
    assert_eq!(blocks.last().unwrap().end_page(), Some(doc.len() - 1));
}

#[test]
fn test_output_ordered_by_page_not_name() {
    let doc = pages(&[
        "2024 Presidential – Wyoming",
        "2024 Presidential – Alabama",
    ]);
    let blocks = segment_pages(&doc, &ReportConfig::default());
    let states: Vec<&str> = blocks.iter().map(|b| b.state).collect();
    assert_eq!(states, vec!["Wyoming", "Alabama"]);
}

#[test]
fn test_missing_states_are_omitted() {
    let doc = pages(&["nothing here", "still nothing"]);
    assert!(segment_pages(&doc, &ReportConfig::default()).is_empty());
}

// ============================================================================
// Block Parser Tests
// ============================================================================

#[test]
fn test_age_takes_priority_over_race() {
    assert_eq!(classify_line("White 18-29 30.0% 40.0%"), GroupType::Age);
    assert_eq!(classify_line("Latino 45–64 30.0% 40.0%"), GroupType::Age);
}

#[test]
fn test_five_tokens_use_first_four() {
    let parsed = parse_state_block(
        "Ohio",
        "Suburban 45.0% 40.0% 35.0% 5.0% 2.0%",
        &ReportConfig::default(),
    );
    let entry = &parsed.groups[&GroupType::Misc][0];
    assert_eq!(
        entry.values,
        NumericValues::Canonical {
            total_pct: Some(45.0),
            dem_pct: Some(40.0),
            gop_pct: Some(35.0),
            other_pct: Some(5.0),
        }
    );
}

#[test]
fn test_sample_size_beyond_scan_window_ignored() {
    let mut text = String::new();
    for i in 0..80 {
        text.push_str(&format!("filler line {}\n", i));
    }
    text.push_str("Sample Size: 900\n");
    let parsed = parse_state_block("Ohio", &text, &ReportConfig::default());
    assert_eq!(parsed.sample_size, None);
}

#[test]
fn test_entries_keep_line_order() {
    let text = "Men 48% 45% 52% 3%\nWomen 52% 55% 43% 2%";
    let parsed = parse_state_block("Ohio", text, &ReportConfig::default());
    let labels: Vec<_> = parsed.groups[&GroupType::Gender]
        .iter()
        .map(|e| e.label.as_deref())
        .collect();
    assert_eq!(labels, vec![Some("Men"), Some("Women")]);
}

#[test]
fn test_flat_rows_follow_first_seen_group_order() {
    let text = "Sample Size: 500\nMen 48% 45% 52% 3%\n18-29 20% 60% 38% 2%\nWomen 52% 55% 43% 2%";
    let parsed = parse_state_block("Ohio", text, &ReportConfig::default());
    let rows = flatten(&[parsed]);
    let order: Vec<(GroupType, Option<&str>)> = rows
        .iter()
        .map(|r| (r.group_type, r.label.as_deref()))
        .collect();
    assert_eq!(
        order,
        vec![
            (GroupType::Gender, Some("Men")),
            (GroupType::Gender, Some("Women")),
            (GroupType::Age, Some("18-29")),
        ]
    );
}

// ============================================================================
// Normalizer Tests
// ============================================================================

#[test]
fn test_exact_hundred_is_idempotent() {
    let rows = vec![
        group_row("Ohio", 40.0, 50.0),
        group_row("Ohio", 35.0, 50.0),
        group_row("Ohio", 25.0, 50.0),
    ];
    let out = normalize(&rows, &ReportConfig::default());
    let totals: Vec<f64> = out.iter().map(|r| r.total_pct).collect();
    assert_eq!(totals, vec![40.0, 35.0, 25.0]);
}

#[test]
fn test_rescale_factor_for_sum_of_80() {
    let rows = vec![
        group_row("Ohio", 30.0, 50.0),
        group_row("Ohio", 50.0, 50.0),
    ];
    let out = normalize(&rows, &ReportConfig::default());
    assert!((out[0].total_pct - 37.5).abs() < 1e-9);
    assert!((out[1].total_pct - 62.5).abs() < 1e-9);
    let sum: f64 = out.iter().map(|r| r.grp_share_of_state).sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn test_sum_of_102_left_alone() {
    let rows = vec![
        group_row("Ohio", 51.0, 50.0),
        group_row("Ohio", 51.0, 50.0),
    ];
    let out = normalize(&rows, &ReportConfig::default());
    assert_eq!(out[0].total_pct, 51.0);
    assert_eq!(out[1].total_pct, 51.0);
}

#[test]
fn test_custom_tolerance() {
    let config = ReportConfig {
        rescale_tolerance: 99.0..=101.0,
        ..ReportConfig::default()
    };
    let rows = vec![group_row("Ohio", 51.0, 50.0), group_row("Ohio", 51.0, 50.0)];
    let out = normalize(&rows, &config);
    assert!((out[0].total_pct - 50.0).abs() < 1e-9);
}

// ============================================================================
// Baseline Tests
// ============================================================================

#[test]
fn test_baseline_arithmetic() {
    let rows = vec![group_row("Ohio", 60.0, 50.0), group_row("Ohio", 40.0, 30.0)];
    let baselines = compute_state_baselines(&normalize(&rows, &ReportConfig::default()));
    assert_eq!(baselines.len(), 1);
    assert!((baselines[0].baseline_dem_share.unwrap() - 42.0).abs() < 1e-9);
    assert!((baselines[0].baseline_margin.unwrap() + 16.0).abs() < 1e-9);
}

#[test]
fn test_state_without_rows_has_no_baseline() {
    let text = "2024 Presidential – Ohio\nSample Size: 500\nMen 48% 45%";
    let analysis = analyze_pages(&pages(&[text]), &ReportConfig::default());
    assert_eq!(analysis.parsed.len(), 1);
    assert!(analysis.rows.is_empty());
    assert!(analysis.baselines.is_empty());
}

#[test]
fn test_zero_sum_state_has_null_baseline() {
    let rows = vec![group_row("Ohio", 0.0, 50.0), group_row("Ohio", 0.0, 30.0)];
    let baselines = compute_state_baselines(&normalize(&rows, &ReportConfig::default()));
    assert_eq!(baselines.len(), 1);
    assert_eq!(baselines[0].baseline_dem_share, None);
    assert_eq!(baselines[0].baseline_margin, None);
}

// ============================================================================
// End-to-End Tests
// ============================================================================

fn sample_report() -> Vec<String> {
    pages(&[
        "2024 Presidential – Nevada\nSample Size: 500\n18-29 20.0% 10.0% 9.0% 1.0%\nWhite 50.0% 25.0% 23.0% 2.0%",
        "2024 Presidential – Oregon\nSample Size: 1,000\nMen 48.0% 45.0% 52.0% 3.0%\nWomen 52.0% 55.0% 43.0% 2.0%",
    ])
}

#[test]
fn test_end_to_end_single_state() {
    let doc = pages(&[
        "2024 Presidential – Nevada\nSample Size: 500\n18-29 20.0% 10.0% 9.0% 1.0%\nWhite 50.0% 25.0% 23.0% 2.0%",
    ]);
    let analysis = analyze_pages(&doc, &ReportConfig::default());

    let nevada: Vec<_> = analysis.rows.iter().filter(|r| r.state == "Nevada").collect();
    assert_eq!(nevada.len(), 2);
    assert_eq!(nevada[0].group_type, GroupType::Age);
    assert_eq!(nevada[1].group_type, GroupType::Race);
    assert_eq!(nevada[0].state_sample, 500);

    // 70 is outside the tolerance band, so totals become 20/70 and 50/70
    assert!((nevada[0].total_pct - 200.0 / 7.0).abs() < 1e-9);

    assert_eq!(analysis.baselines.len(), 1);
    assert!(analysis.baselines[0].baseline_margin.is_some());
}

#[test]
fn test_sequential_and_parallel_agree() {
    let doc = sample_report();
    let parallel = analyze_pages(&doc, &ReportConfig::default());
    let sequential = analyze_pages(
        &doc,
        &ReportConfig {
            parallel: false,
            ..ReportConfig::default()
        },
    );
    assert_eq!(parallel.parsed, sequential.parsed);
    assert_eq!(parallel.rows, sequential.rows);
    assert_eq!(parallel.baselines, sequential.baselines);
}

#[test]
fn test_flatten_preserves_state_order() {
    let analysis = analyze_pages(&sample_report(), &ReportConfig::default());
    let rows = flatten(&analysis.parsed);
    let states: Vec<&str> = rows.iter().map(|r| r.state).collect();
    assert_eq!(states, vec!["Nevada", "Nevada", "Oregon", "Oregon"]);
}

#[test]
fn test_write_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReportConfig::default();
    let analysis = analyze_pages(&sample_report(), &config);

    let files = write_outputs(&analysis, dir.path(), &config).unwrap();
    let expected = OutputFiles::in_dir(dir.path(), &config);
    assert_eq!(files.baselines_csv, expected.baselines_csv);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files.parsed_json).unwrap()).unwrap();
    assert_eq!(json["Oregon"]["sample_size"], 1000);
    assert_eq!(json["Nevada"]["groups"]["Age"][0]["label"], "18-29");
    assert_eq!(json["Nevada"]["groups"]["Age"][0]["values"]["total_pct"], 20.0);

    let groups = std::fs::read_to_string(&files.groups_csv).unwrap();
    assert!(groups.starts_with(
        "state,state_sample,group_type,label,total_pct,dem_pct,gop_pct,other_pct,source_line,grp_share_of_state,dem_rate\n"
    ));
    assert_eq!(groups.lines().count(), 5);

    let baselines = std::fs::read_to_string(&files.baselines_csv).unwrap();
    assert_eq!(baselines.lines().count(), 3);

    let demographics = std::fs::read_to_string(&files.demographics_csv).unwrap();
    assert!(demographics
        .starts_with("state,group_type,label,electorate_share,dem_rate,gop_pct\n"));
}

// ============================================================================
// PDF Extraction Tests
// ============================================================================

fn text_stream(lines: &[&str]) -> lopdf::Stream {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![50.into(), 700.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("Td", vec![0.into(), (-20).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    Stream::new(dictionary! {}, content.encode().unwrap())
}

/// Save a document with one page per content stream
fn build_pdf_with_streams(streams: Vec<lopdf::Stream>) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for stream in streams {
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn build_pdf(lines: &[&str]) -> Vec<u8> {
    build_pdf_with_streams(vec![text_stream(lines)])
}

#[test]
fn test_process_report_from_pdf_buffer() {
    let pdf = build_pdf(&[
        "2024 Presidential - Kentucky",
        "Sample Size: 600",
        "18-29 20.0% 10.0% 9.0% 1.0%",
        "White 80.0% 40.0% 38.0% 2.0%",
    ]);
    let analysis = process_report_mem(&pdf, &ReportConfig::default()).unwrap();
    assert_eq!(analysis.page_count, 1);
    assert_eq!(analysis.blocks.len(), 1);
    assert_eq!(analysis.blocks[0].state, "Kentucky");
    assert_eq!(analysis.parsed[0].sample_size, Some(600));
    assert_eq!(analysis.rows.len(), 2);
}

#[test]
fn test_pdf_without_pages_is_fatal() {
    let pdf = build_pdf_with_streams(Vec::new());
    let result = process_report_mem(&pdf, &ReportConfig::default());
    assert!(matches!(result, Err(ReportError::NoPages)));
    assert!(matches!(
        extract_page_texts_mem(&pdf),
        Err(ReportError::NoPages)
    ));
}

#[test]
fn test_undecodable_page_yields_empty_text() {
    use lopdf::{dictionary, Stream};

    let broken = Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        vec![0xFF, 0x00, 0x13, 0x37, 0xDE, 0xAD],
    );
    let pdf = build_pdf_with_streams(vec![
        broken,
        text_stream(&["2024 Presidential - Idaho", "Sample Size: 400"]),
    ]);

    let texts = extract_page_texts_mem(&pdf).unwrap();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], "");
    assert!(texts[1].contains("Idaho"));

    let analysis = process_report_mem(&pdf, &ReportConfig::default()).unwrap();
    assert_eq!(analysis.page_count, 2);
    assert_eq!(analysis.blocks[0].state, "Idaho");
    assert_eq!(analysis.blocks[0].pages, 1..2);
    assert_eq!(analysis.parsed[0].sample_size, Some(400));
}

#[test]
fn test_invalid_buffer_is_error() {
    let result = process_report_mem(b"not a pdf", &ReportConfig::default());
    assert!(matches!(result, Err(ReportError::Parse(_))));
}

#[test]
fn test_text_items_group_into_report_lines() {
    let items = vec![
        TextItem {
            text: "Sample Size:".into(),
            x: 50.0,
            y: 700.0,
            page: 1,
        },
        TextItem {
            text: "600".into(),
            x: 130.0,
            y: 700.5,
            page: 1,
        },
    ];
    let lines = group_into_lines(items);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text(), "Sample Size: 600");
}
