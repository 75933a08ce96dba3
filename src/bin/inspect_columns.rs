use anyhow::{Result, bail};
use sales_report::ingest::load_sales_table;
use sales_report::processor::{ColumnNormalizer, RuleNormalizer};
use std::env;

fn main() -> Result<()> {
    let Some(path) = env::args().nth(1) else {
        bail!("usage: inspect_columns <sales.csv>");
    };

    println!("=== INSPECTING {} ===\n", path);

    let mut df = load_sales_table(&path)?;

    println!("1. Raw columns:");
    println!("   {:?}", df.get_column_names());

    let normalizer = ColumnNormalizer::new();
    let renames = normalizer.normalize_columns(&mut df)?;

    println!("\n2. After column normalization:");
    for (old, new) in &renames {
        println!("   {:?} -> {}", old, new);
    }
    println!("   {:?}", df.get_column_names());

    let report = RuleNormalizer::new()?.normalize_dataframe(&mut df)?;

    println!("\n3. Schema after cleaning:");
    for column in df.get_columns() {
        println!(
            "   {:<22} {:<10} nulls: {}",
            column.name().as_str(),
            column.dtype().to_string(),
            column.null_count()
        );
    }

    println!("\n4. First rows:");
    println!("{}", df.head(Some(5)));

    println!("\n=== CLEANING SUMMARY ===");
    println!("Rows:                {}", report.rows);
    for (column, failures) in &report.coercion_failures {
        if *failures > 0 {
            println!("Uncoercible {:<9} {}", column, failures);
        }
    }
    println!("Negative values:     {}", report.negative_values);
    println!("Discounts filled:    {}", report.discounts_filled);
    println!("Unparsed dates:      {}", report.unparsed_dates);

    Ok(())
}
