use pdf_sigcheck::{Document, RsaSha1Verifier, SigError, Verdict};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("PDF Signature Verifier");
        eprintln!("Usage: {} <pdf-file> [options]", args[0]);
        eprintln!("\nOptions:");
        eprintln!("  --trusted <der-file>   Add a trust anchor (repeatable)");
        eprintln!("  --xref                 Dump the resolved xref table");
        eprintln!("  --quiet                Only set the exit code");
        eprintln!("\nExit codes:");
        eprintln!("  0 verified, 1 not verified, 2 malformed or unsupported, 3 I/O error");
        process::exit(2);
    }

    let pdf_path = &args[1];

    if !Path::new(pdf_path).exists() {
        eprintln!("Error: file not found: {}", pdf_path);
        process::exit(3);
    }

    let quiet = args.iter().any(|x| x == "--quiet");
    let dump_xref = args.iter().any(|x| x == "--xref");

    // collect every --trusted argument
    let mut anchors: Vec<Vec<u8>> = Vec::new();
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--trusted" {
            if i + 1 >= args.len() {
                eprintln!("Error: --trusted requires a file argument");
                process::exit(2);
            }
            match fs::read(&args[i + 1]) {
                Ok(der) => anchors.push(der),
                Err(e) => {
                    eprintln!("Error reading trust anchor {}: {}", args[i + 1], e);
                    process::exit(3);
                }
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    let mut doc = match Document::from_path(pdf_path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error opening {}: {}", pdf_path, e);
            process::exit(e.exit_code());
        }
    };

    let result = doc.verify(&RsaSha1Verifier, &anchors);

    if !quiet {
        report(pdf_path, &doc, &result);
    }
    if dump_xref {
        if let Some(xref) = doc.xref() {
            println!("xref ({} objects):", xref.len());
            for (obj_num, entry) in xref.iter() {
                let kind = if entry.in_use { "n" } else { "f" };
                println!(
                    "  {:>10} {:>5} {}  offset {}",
                    obj_num, entry.gen_num, kind, entry.byte_offset
                );
            }
        }
    }

    match result {
        Ok(()) => process::exit(0),
        Err(e) => process::exit(e.exit_code()),
    }
}

fn report(pdf_path: &str, doc: &Document, result: &Result<(), SigError>) {
    println!("File: {}", pdf_path);

    if let Some((x, y)) = doc.pdf_version() {
        println!("PDF version: {}.{}", x, y);
    }

    if doc.signature_present() {
        if let Some(subfilter) = doc.subfilter() {
            println!("Signature: present, subfilter {}", subfilter.as_str());
        }
        println!("Certificates: {}", doc.cert_chain().len());
        println!("Digest match: {}", verdict_str(doc.digest_match()));
        println!("Certificate chain: {}", verdict_str(doc.cert_chain_valid()));
    } else {
        println!("Signature: none found");
    }

    match result {
        Ok(()) => println!("Result: VERIFIED"),
        Err(e) => println!("Result: NOT VERIFIED ({})", e),
    }
}

fn verdict_str(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Unchecked => "unchecked",
        Verdict::Ok => "ok",
        Verdict::Fail => "FAIL",
    }
}
