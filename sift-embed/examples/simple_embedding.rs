//! Simple example comparing texts with the offline hashing embedder

use sift_embed::{EmbeddingProvider, HashingProvider};

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let provider = HashingProvider::new(128)?;
    println!("Provider: {}", provider.provider_name());
    println!("Dimension: {:?}", provider.embedding_dimension());

    let query = "How did operating margins change?";
    let texts = vec![
        "Operating margins widened by two points year over year.".to_string(),
        "The board approved a new share buyback program.".to_string(),
        "Headcount was flat across all regions.".to_string(),
    ];

    let query_embedding = provider.embed_text(query).await?;
    let result = provider.embed_texts(&texts).await?;

    println!("\nQuery: \"{query}\"");
    for (text, embedding) in texts.iter().zip(result.embeddings.iter()) {
        println!(
            "  {:.4}  {}",
            squared_distance(&query_embedding, embedding),
            text
        );
    }

    Ok(())
}
