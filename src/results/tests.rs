//! Tests for the parse and aggregate pipeline.

use super::{aggregate, parse_str, ReportView, RiskTier};

/// Builds a result document with the given number of sources per finding.
fn document(sources_per_finding: &[usize]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <DataFlowResults FileFormatVersion=\"102\" TerminationState=\"Success\">\n<Results>\n",
    );

    for (i, sources) in sources_per_finding.iter().enumerate() {
        xml.push_str(&format!(
            "<Result><Sink Statement=\"sink {i}\" Method=\"&lt;com.example.A: void m{i}()&gt;\" \
             MethodSourceSinkDefinition=\"&lt;android.util.Log: int d{m}(java.lang.String)&gt;\"/>\
             <Sources>",
            i = i,
            m = i % 3
        ));
        for j in 0..*sources {
            xml.push_str(&format!(
                "<Source Statement=\"source {j}\" Method=\"&lt;com.example.A: void m{i}()&gt;\" \
                 MethodSourceSinkDefinition=\"&lt;android.accounts.AccountManager: \
                 android.accounts.Account[] get{j}()&gt;\"/>",
                i = i,
                j = j % 4
            ));
        }
        xml.push_str("</Sources></Result>\n");
    }

    xml.push_str(
        "</Results>\n<PerformanceData>\
         <PerformanceEntry Name=\"TotalRuntimeSeconds\" Value=\"9\"/>\
         </PerformanceData>\n</DataFlowResults>",
    );
    xml
}

#[test]
fn it_counts_match_findings() {
    let layouts: &[&[usize]] = &[
        &[],
        &[1],
        &[2],
        &[0, 0, 3],
        &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        &[2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    ];

    for layout in layouts {
        let report = parse_str(&document(layout)).unwrap();
        let stats = aggregate(report.findings());

        let pairs: usize = layout.iter().sum();
        assert_eq!(report.findings().len(), layout.len());
        assert_eq!(stats.source_type_counts().values().sum::<usize>(), pairs);
        assert_eq!(stats.sink_type_counts().values().sum::<usize>(), layout.len());
        assert_eq!(stats.risk_tier(), RiskTier::from_findings(layout.len()));
    }
}

#[test]
fn it_report_view() {
    let report = parse_str(&document(&[2, 1])).unwrap();
    let view = ReportView::new("com.example.leaky", report);

    assert_eq!(view.package(), "com.example.leaky");
    assert_eq!(view.stats().total_findings(), 2);
    assert_eq!(view.stats().unique_sources(), 2);
    assert_eq!(view.stats().unique_sinks(), 2);
    assert_eq!(
        view.report()
            .performance()
            .get("TotalRuntimeSeconds")
            .map(String::as_str),
        Some("9")
    );

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["package"], "com.example.leaky");
    assert_eq!(json["termination_state"], "Success");
    assert_eq!(json["success"], true);
    assert_eq!(json["risk_tier"], "medium");
    assert_eq!(json["total_findings"], 2);
    assert_eq!(json["findings"][0]["sources"].as_array().unwrap().len(), 2);
    assert_eq!(json["findings"][0]["sink"]["statement"], "sink 0");
    assert!(json["findings"][0]["sink"]["access_path"].is_null());
    assert_eq!(
        json["source_type_counts"]["AccountManager.android.accounts.Account[] get0()"],
        2
    );
}
