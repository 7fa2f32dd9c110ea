use clap::Parser;
use serde::Serialize;
use sift_context::text::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITERS};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk text files into JSON output using sift-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum length of each chunk in characters.
    #[arg(short = 's', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters of trailing context repeated at the start of the next chunk.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,

    /// Comma-separated list of regex patterns for delimiters.
    /// Defaults to sentence, clause and word boundaries if not provided.
    #[arg(short, long, value_delimiter = ',')]
    delimiters: Option<Vec<String>>,
}

#[derive(Serialize)]
struct SerializableChunk<'a> {
    sequence: usize,
    chars: usize,
    text: &'a str,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let delimiter_patterns_owned: Vec<String> = if let Some(d) = args.delimiters {
        d
    } else {
        DEFAULT_DELIMITERS.iter().map(|&s| s.to_string()).collect()
    };

    let delimiter_patterns_refs: Vec<&str> = delimiter_patterns_owned
        .iter()
        .map(|s| s.as_str())
        .collect();

    let chunker =
        Chunker::with_delimiters(args.chunk_size, args.overlap, &delimiter_patterns_refs)?;

    let chunks = chunker.get_chunks(&file_content);

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .map(|c| SerializableChunk {
            sequence: c.sequence,
            chars: c.char_len(),
            text: &c.text,
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&serializable_chunks)?;
    println!("{}", json_output);

    Ok(())
}
