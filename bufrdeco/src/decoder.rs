use crate::{
    bits::{BitReader, all_ones},
    block::MessageBlock,
    config::DecoderConfig,
    diagnostics::Diagnostics,
    errors::{Error, Result},
    operator::{Effect, ElementSpec, OperatorState, signed_reference},
    structs::versions::MessageVersion,
    tree::{SequenceTree, Visitor},
    value::{AtomicValue, CompressedRef, Kind, SubsetValues},
};
use encoding_rs::WINDOWS_1252;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tablelib::{
    FXY, TableLoader, TableSet,
    tables::{BTableEntry, UnitKind},
};
use tracing::{debug, trace};

const ASSOCIATED_FIELD: &str = "ASSOCIATED FIELD";
const SIGNIFY_CHARACTER: &str = "SIGNIFY CHARACTER";
const CCITT_IA5: &str = "CCITT IA5";

/// Section 4 leftovers up to this many bits are padding.
const PADDING_BITS: usize = 15;

/// Decoding session of one message: tables, tree and the position of the
/// next subset.
pub struct Decoder<'m> {
    block: &'m MessageBlock,
    config: DecoderConfig,
    tables: TableSet,
    tree: SequenceTree,
    diagnostics: Diagnostics,
    cache: Cache,
    next: usize,
    cursor: usize,
    failed: bool,
    finished: bool,
    compressed: Option<Vec<SubsetValues>>,
}

/// Memo over table lookups, shared by every subset of the message.
#[derive(Default)]
struct Cache {
    b: FxHashMap<FXY, Arc<BTableEntry>>,
    meanings: FxHashMap<(FXY, u64), Option<String>>,
}

struct Lookup<'a> {
    tables: &'a TableSet,
    cache: &'a mut Cache,
}

impl Lookup<'_> {
    fn element(&mut self, fxy: &FXY) -> Result<Arc<BTableEntry>> {
        if let Some(e) = self.cache.b.get(fxy) {
            return Ok(e.clone());
        }

        let entry = Arc::new(
            self.tables
                .b
                .lookup(fxy)
                .ok_or(Error::UnknownElement(*fxy))?,
        );
        self.cache.b.insert(*fxy, entry.clone());
        Ok(entry)
    }

    fn explain(&mut self, entry: &BTableEntry, raw: u64, width: usize) -> Option<String> {
        let kind = entry.unit_kind();
        if !matches!(kind, UnitKind::CodeTable | UnitKind::FlagTable) {
            return None;
        }
        let c = self.tables.c.as_ref()?;

        self.cache
            .meanings
            .entry((entry.fxy, raw))
            .or_insert_with(|| match kind {
                UnitKind::CodeTable => c.code_meaning(&entry.fxy, raw as u32),
                _ => c.flag_meaning(&entry.fxy, raw, width as u32),
            })
            .clone()
    }

    fn value(&mut self, entry: &BTableEntry, spec: &ElementSpec, raw: Option<u64>) -> AtomicValue {
        let kind = match entry.unit_kind() {
            UnitKind::CodeTable => Kind::NUMERIC | Kind::CODE_TABLE,
            UnitKind::FlagTable => Kind::NUMERIC | Kind::FLAG_TABLE,
            _ => Kind::NUMERIC,
        };

        let Some(raw) = raw else {
            return AtomicValue::missing(entry.fxy, &entry.name, &entry.unit, kind);
        };

        let mut value = AtomicValue::number(
            entry.fxy,
            &entry.name,
            &entry.unit,
            evaluate(raw, spec),
            spec.scale,
        );
        value.kind = kind;
        value.explanation = self.explain(entry, raw, spec.width);
        value
    }
}

/// `(raw + reference) * 10^-scale`
#[inline]
pub fn evaluate(raw: u64, spec: &ElementSpec) -> f64 {
    let v = (raw as i64 + spec.reference as i64) as f64;
    if spec.scale >= 0 {
        v / 10f64.powi(spec.scale)
    } else {
        v * 10f64.powi(-spec.scale)
    }
}

/// Single-byte text with trailing blanks and NULs removed; all `0xFF` is
/// missing.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if !bytes.is_empty() && bytes.iter().all(|b| *b == 0xFF) {
        return None;
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    Some(text.trim_end_matches([' ', '\0']).to_string())
}

fn present(raw: u64, width: usize) -> Option<u64> {
    (raw != all_ones(width)).then_some(raw)
}

fn associated_value(width: usize, raw: Option<u64>) -> AtomicValue {
    let desc = FXY::new(2, 4, width as u8);
    match raw {
        Some(raw) => AtomicValue::number(desc, ASSOCIATED_FIELD, "", raw as f64, 0),
        None => AtomicValue::missing(desc, ASSOCIATED_FIELD, "", Kind::NUMERIC),
    }
}

fn signify_value(op: &FXY, text: Option<String>) -> AtomicValue {
    AtomicValue::text(*op, SIGNIFY_CHARACTER, CCITT_IA5, text)
}

/// Class 31 factors are counts, so all ones is a value and never missing.
fn factor_from(replicator: &FXY, entry: &BTableEntry, raw: u64) -> Result<usize> {
    let n = raw as i64 + entry.reference as i64;
    usize::try_from(n).map_err(|_| Error::BadReplicationFactor(*replicator, format!("negative factor {}", n)))
}

struct PlainDecoder<'a> {
    lookup: Lookup<'a>,
    reader: BitReader<'a>,
    state: OperatorState,
    out: &'a mut SubsetValues,
}

impl Visitor for PlainDecoder<'_> {
    fn element(&mut self, fxy: &FXY) -> Result<()> {
        let entry = self.lookup.element(fxy)?;

        if let Some(width) = self.state.reference_width {
            let raw = self.reader.read(width)?;
            self.state
                .new_references
                .insert(*fxy, signed_reference(raw, width));
            return Ok(());
        }

        let assoc = self.state.associated_for(&entry);
        if assoc > 0 {
            let raw = self.reader.read_u64(assoc)?;
            self.out.push(associated_value(assoc, present(raw, assoc)))?;
        }

        let value = match entry.unit_kind() {
            UnitKind::Ccitt => {
                let bytes = self.reader.read_bytes(entry.width as usize / 8)?;
                AtomicValue::text(*fxy, &entry.name, &entry.unit, decode_text(&bytes))
            }
            _ => {
                let spec = self.state.spec(&entry)?;
                let raw = self.reader.read_u64(spec.width)?;
                self.lookup.value(&entry, &spec, present(raw, spec.width))
            }
        };
        self.out.push(value)
    }

    fn operator(&mut self, fxy: &FXY) -> Result<()> {
        if let Effect::Signify(n) = self.state.apply(fxy)? {
            let bytes = self.reader.read_bytes(n)?;
            self.out.push(signify_value(fxy, decode_text(&bytes)))?;
        }
        Ok(())
    }

    fn delayed_count(&mut self, replicator: &FXY, factor: &FXY) -> Result<usize> {
        let entry = self.lookup.element(factor)?;
        let spec = self.state.spec(&entry)?;
        let raw = self.reader.read_u64(spec.width)?;

        let count = factor_from(replicator, &entry, raw)?;
        self.out.push(self.lookup.value(&entry, &spec, Some(raw)))?;
        Ok(count)
    }
}

struct CompressedDecoder<'a> {
    lookup: Lookup<'a>,
    reader: BitReader<'a>,
    state: OperatorState,
    subsets: &'a mut [SubsetValues],
}

impl CompressedDecoder<'_> {
    /// Subset values of one element, all-ones meaning missing.
    fn read_numeric(&mut self, width: usize) -> Result<(CompressedRef, Vec<Option<u64>>)> {
        let (reference, incs) = self.read_increments(width)?;
        let r0 = reference.reference;
        let nbinc = reference.increment_bits as usize;

        let raws = if nbinc == 0 {
            vec![present(r0, width); incs.len()]
        } else {
            incs.into_iter()
                .map(|inc| present(inc, nbinc).map(|inc| r0.saturating_add(inc)))
                .collect()
        };
        Ok((reference, raws))
    }

    /// Same layout as `read_numeric`, without the all-ones missing rule.
    fn read_counts(&mut self, width: usize) -> Result<(CompressedRef, Vec<u64>)> {
        let (reference, incs) = self.read_increments(width)?;
        let r0 = reference.reference;
        let raws = incs.into_iter().map(|inc| r0.saturating_add(inc)).collect();
        Ok((reference, raws))
    }

    /// R0, the increment width, then one increment per subset.
    fn read_increments(&mut self, width: usize) -> Result<(CompressedRef, Vec<u64>)> {
        let r0 = self.reader.read_u64(width)?;
        let nbinc = self.reader.read(6)? as usize;
        let n = self.subsets.len();

        let incs = if nbinc == 0 {
            vec![0; n]
        } else {
            let mut incs = Vec::with_capacity(n);
            for _ in 0..n {
                incs.push(self.reader.read_u64(nbinc)?);
            }
            incs
        };

        let reference = CompressedRef {
            reference: r0,
            increment_bits: nbinc as u8,
        };
        Ok((reference, incs))
    }

    /// R0 of `nbytes` characters, then a byte count per subset string.
    fn read_strings(&mut self, nbytes: usize) -> Result<(CompressedRef, Vec<Option<String>>)> {
        let r0 = self.reader.read_bytes(nbytes)?;
        let nbinc = self.reader.read(6)? as usize;
        let n = self.subsets.len();

        let texts = if nbinc == 0 {
            vec![decode_text(&r0); n]
        } else {
            let mut texts = Vec::with_capacity(n);
            for _ in 0..n {
                texts.push(decode_text(&self.reader.read_bytes(nbinc)?));
            }
            texts
        };

        let reference = CompressedRef {
            reference: 0,
            increment_bits: nbinc as u8,
        };
        Ok((reference, texts))
    }
}

impl Visitor for CompressedDecoder<'_> {
    fn element(&mut self, fxy: &FXY) -> Result<()> {
        let entry = self.lookup.element(fxy)?;

        if let Some(width) = self.state.reference_width {
            let (reference, _) = self.read_numeric(width)?;
            if reference.increment_bits != 0 {
                return Err(Error::CompressionMismatch(format!(
                    "new reference value for {} differs between subsets",
                    fxy
                )));
            }
            self.state
                .new_references
                .insert(*fxy, signed_reference(reference.reference as u32, width));
            return Ok(());
        }

        let assoc = self.state.associated_for(&entry);
        if assoc > 0 {
            let (reference, raws) = self.read_numeric(assoc)?;
            for (subset, raw) in self.subsets.iter_mut().zip(raws) {
                subset.push(associated_value(assoc, raw).with_compressed(reference))?;
            }
        }

        if entry.unit_kind() == UnitKind::Ccitt {
            let (reference, texts) = self.read_strings(entry.width as usize / 8)?;
            for (subset, text) in self.subsets.iter_mut().zip(texts) {
                let value = AtomicValue::text(*fxy, &entry.name, &entry.unit, text);
                subset.push(value.with_compressed(reference))?;
            }
            return Ok(());
        }

        let spec = self.state.spec(&entry)?;
        let (reference, raws) = self.read_numeric(spec.width)?;
        for (subset, raw) in self.subsets.iter_mut().zip(raws) {
            let value = self.lookup.value(&entry, &spec, raw);
            subset.push(value.with_compressed(reference))?;
        }
        Ok(())
    }

    fn operator(&mut self, fxy: &FXY) -> Result<()> {
        if let Effect::Signify(n) = self.state.apply(fxy)? {
            let (reference, texts) = self.read_strings(n)?;
            for (subset, text) in self.subsets.iter_mut().zip(texts) {
                subset.push(signify_value(fxy, text).with_compressed(reference))?;
            }
        }
        Ok(())
    }

    fn delayed_count(&mut self, replicator: &FXY, factor: &FXY) -> Result<usize> {
        let entry = self.lookup.element(factor)?;
        let spec = self.state.spec(&entry)?;
        let (reference, raws) = self.read_counts(spec.width)?;

        let first = raws.first().copied().unwrap_or(reference.reference);
        if raws.iter().any(|r| *r != first) {
            return Err(Error::BadReplicationFactor(
                *replicator,
                "factor differs between subsets".into(),
            ));
        }
        let count = factor_from(replicator, &entry, first)?;

        for subset in self.subsets.iter_mut() {
            let value = self.lookup.value(&entry, &spec, Some(first));
            subset.push(value.with_compressed(reference))?;
        }
        Ok(count)
    }
}

impl<'m> Decoder<'m> {
    /// Load the tables the message asks for and expand its descriptors.
    pub fn from_message(block: &'m MessageBlock, config: &DecoderConfig) -> Result<Self> {
        let mut diagnostics = Diagnostics::new(config.diagnostics_capacity);
        for note in block.notes() {
            diagnostics.warning(note.clone());
        }
        for note in block.identification().implausible_fields() {
            diagnostics.warning(note);
        }

        let tables = TableLoader::new(&config.tables).load_set(&block.table_info())?;
        for note in &tables.notes {
            diagnostics.warning(note.clone());
        }

        let descriptors = block.descriptors()?;
        let tree = SequenceTree::build(&descriptors, &tables.d, block.is_compressed())?;
        debug!(
            nodes = tree.len(),
            subsets = block.subsets_count(),
            compressed = block.is_compressed(),
            "sequence tree built"
        );

        Ok(Decoder {
            block,
            config: config.clone(),
            tables,
            tree,
            diagnostics,
            cache: Cache::default(),
            next: 0,
            cursor: 0,
            failed: false,
            finished: false,
            compressed: None,
        })
    }

    pub fn block(&self) -> &MessageBlock {
        self.block
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn tree(&self) -> &SequenceTree {
        &self.tree
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn subsets_count(&self) -> usize {
        self.block.subsets_count() as usize
    }

    /// Empty output buffer sized from the configuration.
    pub fn buffer(&self) -> SubsetValues {
        SubsetValues::new(self.config.max_subset_values)
    }

    /// Decode the next subset into `out`. Returns `false` once every subset
    /// has been handed out. An error only concerns the subset it is returned
    /// for.
    pub fn next_subset(&mut self, out: &mut SubsetValues) -> Result<bool> {
        if self.block.is_compressed() {
            self.next_compressed_subset(out)
        } else {
            self.next_plain_subset(out)
        }
    }

    pub fn next_plain_subset(&mut self, out: &mut SubsetValues) -> Result<bool> {
        if self.block.is_compressed() {
            return Err(Error::CompressionMismatch(
                "compressed message on the plain path".to_string(),
            ));
        }
        let Some(index) = self.advance() else {
            return Ok(false);
        };
        out.reset(index);

        if self.failed {
            return Err(Error::Desynchronized(index));
        }

        let block: &'m MessageBlock = self.block;
        let mut decoder = PlainDecoder {
            lookup: Lookup {
                tables: &self.tables,
                cache: &mut self.cache,
            },
            reader: BitReader::at(block.data_block(), self.cursor),
            state: OperatorState::new(),
            out,
        };

        let walked = self.tree.walk(&mut decoder);
        let position = decoder.reader.position();

        match walked {
            Ok(()) => {
                trace!(subset = index, bits = position - self.cursor, "subset decoded");
                self.cursor = position;
                Ok(true)
            }
            Err(e) => {
                self.failed = true;
                self.diagnostics.error(format!("subset {}: {}", index, e));
                Err(e)
            }
        }
    }

    /// Decode every subset of a compressed message in one pass.
    pub fn decode_compressed(&mut self) -> Result<Vec<SubsetValues>> {
        if !self.block.is_compressed() {
            return Err(Error::CompressionMismatch(
                "uncompressed message on the compressed path".to_string(),
            ));
        }

        let mut subsets: Vec<SubsetValues> = (0..self.subsets_count())
            .map(|i| {
                let mut s = self.buffer();
                s.reset(i);
                s
            })
            .collect();
        if subsets.is_empty() {
            return Ok(subsets);
        }

        let block: &'m MessageBlock = self.block;
        let mut decoder = CompressedDecoder {
            lookup: Lookup {
                tables: &self.tables,
                cache: &mut self.cache,
            },
            reader: BitReader::new(block.data_block()),
            state: OperatorState::new(),
            subsets: &mut subsets,
        };

        self.tree.walk(&mut decoder)?;
        self.cursor = decoder.reader.position();
        self.report_trailing_bits();

        Ok(subsets)
    }

    fn next_compressed_subset(&mut self, out: &mut SubsetValues) -> Result<bool> {
        let Some(index) = self.advance() else {
            return Ok(false);
        };
        out.reset(index);

        if self.compressed.is_none() && !self.failed {
            match self.decode_compressed() {
                Ok(all) => self.compressed = Some(all),
                Err(e) => {
                    self.failed = true;
                    self.diagnostics.error(format!("compressed data: {}", e));
                    return Err(e);
                }
            }
        }

        match self.compressed.as_mut().and_then(|all| all.get_mut(index)) {
            Some(values) => {
                *out = std::mem::take(values);
                Ok(true)
            }
            None => Err(Error::Desynchronized(index)),
        }
    }

    /// Every subset, in order, each with its own outcome.
    pub fn decode_all(&mut self) -> Vec<Result<SubsetValues>> {
        let mut results = vec![];
        loop {
            let mut out = self.buffer();
            match self.next_subset(&mut out) {
                Ok(true) => results.push(Ok(out)),
                Ok(false) => break,
                Err(e) => results.push(Err(e)),
            }
        }
        results
    }

    fn advance(&mut self) -> Option<usize> {
        if self.next >= self.subsets_count() {
            if !self.block.is_compressed() && !self.failed {
                self.report_trailing_bits();
            }
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(index)
    }

    fn report_trailing_bits(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let total = self.block.data_block().len() * 8;
        let left = total.saturating_sub(self.cursor);
        if left > PADDING_BITS {
            self.diagnostics
                .info(format!("{} unused bits at the end of section 4", left));
        }
    }
}
