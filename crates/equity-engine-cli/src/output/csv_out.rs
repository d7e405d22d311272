use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            if let Some(Value::Array(dists)) = map
                .get("result")
                .and_then(|r| r.get("distributions_by_valuation"))
            {
                write_distributions_csv(&mut wtr, dists);
            } else if let Some(Value::Object(result)) = map.get("result") {
                // Two-column CSV: field, value
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in result {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

/// Long format: one row per (exit valuation, stakeholder).
fn write_distributions_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, dists: &[Value]) {
    let _ = wtr.write_record([
        "exit_valuation",
        "stakeholder_id",
        "preference_payout",
        "participation_payout",
        "total_payout",
    ]);
    for dist in dists {
        let exit = dist.get("exit_valuation").map(format_csv_value).unwrap_or_default();
        let Some(Value::Array(payouts)) = dist.get("stakeholder_payouts") else {
            continue;
        };
        for p in payouts {
            let cell = |k: &str| p.get(k).map(format_csv_value).unwrap_or_default();
            let _ = wtr.write_record([
                exit.clone(),
                cell("stakeholder_id"),
                cell("preference_payout"),
                cell("participation_payout"),
                cell("total_payout"),
            ]);
        }
        if let Some(pool) = dist.get("option_pool_payout") {
            let pool = format_csv_value(pool);
            let _ = wtr.write_record([
                exit.clone(),
                "option_pool".to_string(),
                String::new(),
                pool.clone(),
                pool,
            ]);
        }
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    // Extract headers from first object
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        map.get(*h)
                            .map(|v| format_csv_value(v))
                            .unwrap_or_default()
                    })
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
