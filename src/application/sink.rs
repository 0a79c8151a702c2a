//! Destinations for classified products
//!
//! The orchestrator hands each category partition to a `ProductSink`. Writers
//! for concrete file formats live outside this crate; `JsonLinesSink` covers
//! the runner binary and `MemorySink` covers tests.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};

use crate::domain::{Product, ProductCategory};

pub trait ProductSink {
    /// Receive every successful product of one category
    fn accept(&mut self, category: ProductCategory, products: &[Product]) -> Result<()>;
}

/// Keeps delivered partitions in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: BTreeMap<ProductCategory, Vec<Product>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self, category: ProductCategory) -> &[Product] {
        self.batches.get(&category).map_or(&[], Vec::as_slice)
    }
}

impl ProductSink for MemorySink {
    fn accept(&mut self, category: ProductCategory, products: &[Product]) -> Result<()> {
        self.batches.entry(category).or_default().extend_from_slice(products);
        Ok(())
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProductSink for JsonLinesSink<W> {
    fn accept(&mut self, category: ProductCategory, products: &[Product]) -> Result<()> {
        for product in products {
            serde_json::to_writer(&mut self.writer, product)
                .with_context(|| format!("Failed to serialize {} product '{}'", category, product.name()))?;
            self.writer.write_all(b"\n").context("Failed to write product line")?;
        }
        self.writer.flush().context("Failed to flush product output")?;
        Ok(())
    }
}
