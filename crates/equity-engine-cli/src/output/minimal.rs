use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    // Try to extract the "result" envelope
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Priority list of key output fields
    let priority_keys = [
        "valuation",
        "net_outcome",
        "final_ownership",
        "post_money_valuation",
        "npv",
        "irr",
        "xirr",
        "mean",
        "severity",
        "average_valuation",
    ];

    // Waterfalls have no single answer: one line per exit.
    if let Some(Value::Array(dists)) = result_obj.get("distributions_by_valuation") {
        for dist in dists {
            let payouts: Vec<String> = dist
                .get("stakeholder_payouts")
                .and_then(Value::as_array)
                .map(|ps| {
                    ps.iter()
                        .map(|p| {
                            format!(
                                "{}={}",
                                p.get("stakeholder_id").map(format_minimal).unwrap_or_default(),
                                p.get("total_payout").map(format_minimal).unwrap_or_default()
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            let exit = dist.get("exit_valuation").map(format_minimal).unwrap_or_default();
            println!("{}: {}", exit, payouts.join(" "));
        }
        return;
    }

    if let Value::Object(map) = result_obj {
        // Try priority keys first (skip null values)
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        // Fall back to first field
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // Not an object, just print directly
    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
