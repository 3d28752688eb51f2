//! # Quire CLI
//!
//! Usage:
//!   quire input.json -o layout.json
//!   echo '{ ... }' | quire
//!   quire --example > report.json
//!
//! Set `RUST_LOG=quire=debug` to follow the pass.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_json());
        return;
    }

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1]).map_err(|e| format!("cannot read {}: {e}", args[1]))
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map(|_| buf)
            .map_err(|e| format!("cannot read stdin: {e}"))
    };
    let input = input.unwrap_or_else(|e| fail(&e));

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone());

    let tree = quire::layout_json(&input).unwrap_or_else(|e| fail(&format!("layout failed: {e}")));
    let json = serde_json::to_string_pretty(&tree)
        .unwrap_or_else(|e| fail(&format!("cannot serialize layout: {e}")));

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                fail(&format!("cannot write {path}: {e}"));
            }
            eprintln!(
                "✓ {} pages, {} blocks, {} diagnostics written to {}",
                tree.pages.len(),
                tree.blocks.len(),
                tree.diagnostics.len(),
                path
            );
        }
        None => println!("{json}"),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("✗ {message}");
    process::exit(1);
}

fn example_json() -> &'static str {
    r##"{
  "defaultPage": {
    "size": "A4",
    "margin": { "top": 54, "right": 54, "bottom": 54, "left": 54 },
    "columns": 1
  },
  "children": [
    {
      "kind": { "type": "Text", "content": "Quarterly Report" },
      "style": { "fontSize": "24pt", "fontWeight": 700, "display": "Block" }
    },
    {
      "kind": { "type": "Block" },
      "style": { "float": "Right", "width": "35%", "margin": { "top": 0, "right": 0, "bottom": 6, "left": 12 } },
      "children": [
        {
          "kind": { "type": "Image", "src": "chart.png", "pixelWidth": 682, "pixelHeight": 452 },
          "style": { "maxWidth": "100%", "display": "Block" }
        }
      ]
    },
    {
      "kind": {
        "type": "Text",
        "content": "Revenue grew in every region this quarter. The chart to the right breaks the total down by month; the table below lists the figures by region and product line."
      },
      "style": { "textAlign": "Justify", "textIndent": "1em" }
    },
    {
      "kind": { "type": "Block" },
      "style": { "position": "Relative", "top": "4pt", "left": "8pt", "margin": { "top": 12, "right": 0, "bottom": 12, "left": 0 } },
      "children": [
        { "kind": { "type": "Text", "content": "Figures are unaudited." }, "style": { "fontSize": "9pt" } }
      ]
    },
    {
      "kind": {
        "type": "Table",
        "columns": [
          { "width": { "Fixed": 120 } },
          { "width": "Auto" },
          { "width": "Auto" }
        ]
      },
      "children": [
        {
          "kind": { "type": "TableRow", "isHeader": true },
          "children": [
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "Region" } }] },
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "Product" } }] },
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "Revenue" } }] }
          ]
        },
        {
          "kind": { "type": "TableRow" },
          "children": [
            {
              "kind": { "type": "TableCell", "rowSpan": 2 },
              "style": { "verticalAlign": "Middle" },
              "children": [{ "kind": { "type": "Text", "content": "North" } }]
            },
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "Hardware" } }] },
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "1,240,000" } }] }
          ]
        },
        {
          "kind": { "type": "TableRow" },
          "children": [
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "Services" } }] },
            { "kind": { "type": "TableCell" }, "children": [{ "kind": { "type": "Text", "content": "310,500" } }] }
          ]
        }
      ]
    },
    {
      "kind": { "type": "Text", "content": "Confidential" },
      "style": { "position": "Fixed", "bottom": "18pt", "right": "54pt", "fontSize": "8pt" }
    }
  ]
}
"##
}
