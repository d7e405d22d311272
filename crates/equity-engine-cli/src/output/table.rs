use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    let Value::Object(res_map) = result else {
        print_flat_object(envelope);
        return;
    };

    // Scalars first, then one table per list of records.
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in res_map {
        if !is_record_list(val) {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
    }
    println!("{}", Table::from(builder));

    for (key, val) in res_map {
        if key == "distributions_by_valuation" {
            if let Value::Array(dists) = val {
                print_distributions(dists);
            }
        } else if let Value::Array(arr) = val {
            if is_record_list(val) {
                println!("\n{}:", key);
                print_array_table(arr);
            }
        }
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// One payout table per exit valuation.
fn print_distributions(dists: &[Value]) {
    for dist in dists {
        let exit = dist.get("exit_valuation").map(format_value).unwrap_or_default();
        println!("\nExit at {}:", exit);
        let mut builder = Builder::default();
        builder.push_record(["Stakeholder", "Preference", "Participation", "Total", "Share"]);
        if let Some(Value::Array(payouts)) = dist.get("stakeholder_payouts") {
            for p in payouts {
                let cell = |k: &str| p.get(k).map(format_value).unwrap_or_default();
                builder.push_record([
                    cell("name"),
                    cell("preference_payout"),
                    cell("participation_payout"),
                    cell("total_payout"),
                    cell("share_of_exit"),
                ]);
            }
        }
        if let Some(pool) = dist.get("option_pool_payout") {
            builder.push_record([
                "Option pool".to_string(),
                String::new(),
                format_value(pool),
                format_value(pool),
                String::new(),
            ]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if arr.first().is_some_and(Value::is_object))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
