// ============================================================
// Layer 4 — Corpus Loader (WikiQA-style TSV)
// ============================================================
// Reads tab-separated answer-selection corpora such as
// WikiQA-train.tsv or SQuAD-T-QA.tsv.
//
// Record layout (one candidate sentence per row):
//   QuestionID  Question  DocumentID  DocumentTitle  SentenceID  Sentence  Label
//
// Consecutive rows sharing a QuestionID form one Sample:
//
//   Q1  how are glacier caves formed?  ...  D1-0  A partly ...  0
//   Q1  how are glacier caves formed?  ...  D1-1  A glacier ... 1   ──► Sample(Q1, 2 docs)
//   Q2  how much is 1 tablespoon ...   ...  D2-0  This ...      0   ──► Sample(Q2, 1 doc)
//
// Two CorpusSource implementations:
//   TsvCorpus      → re-opens the file on every pass (lazy, low memory)
//   InMemoryCorpus → samples cached once, cloned on every pass

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::PathBuf,
};

use crate::data::preprocessor::Preprocessor;
use crate::domain::document::Relevance;
use crate::domain::error::QaError;
use crate::domain::sample::Sample;
use crate::domain::traits::{CorpusSource, SampleIter};

const NUM_COLUMNS: usize = 7;
const COL_QUESTION_ID: usize = 0;
const COL_QUESTION: usize = 1;
const COL_SENTENCE_ID: usize = 4;
const COL_SENTENCE: usize = 5;
const COL_LABEL: usize = 6;

// ─── TsvCorpus ────────────────────────────────────────────────────────────────
/// File-backed corpus. Every pass re-reads the file from the top.
pub struct TsvCorpus {
    path: PathBuf,
}

impl TsvCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the whole file once and cache the samples in memory.
    pub fn load_all(&self) -> Result<InMemoryCorpus, QaError> {
        let corpus = InMemoryCorpus::new(self.pass()?.collect::<Result<Vec<_>, _>>()?);
        tracing::info!("Loaded {} queries from '{}'", corpus.len(), self.path.display());
        Ok(corpus)
    }
}

impl CorpusSource for TsvCorpus {
    fn pass(&self) -> Result<SampleIter<'_>, QaError> {
        let file = File::open(&self.path)?;
        tracing::debug!("Opened corpus '{}' for a new pass", self.path.display());
        Ok(Box::new(TsvSamples::new(BufReader::new(file))))
    }
}

// ─── InMemoryCorpus ───────────────────────────────────────────────────────────
/// Corpus cached in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    samples: Vec<Sample>,
}

impl InMemoryCorpus {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl CorpusSource for InMemoryCorpus {
    fn pass(&self) -> Result<SampleIter<'_>, QaError> {
        Ok(Box::new(self.samples.iter().cloned().map(Ok)))
    }
}

// ─── Row grouping iterator ────────────────────────────────────────────────────
struct TsvSamples<R> {
    lines:        Lines<R>,
    line_no:      usize,
    current:      Option<PendingQuery>,
    preprocessor: Preprocessor,
    done:         bool,
}

impl<R: BufRead> TsvSamples<R> {
    fn new(reader: R) -> Self {
        Self {
            lines:        reader.lines(),
            line_no:      0,
            current:      None,
            preprocessor: Preprocessor::new(),
            done:         false,
        }
    }

    fn fail(&mut self, e: QaError) -> Option<Result<Sample, QaError>> {
        self.done = true;
        Some(Err(e))
    }
}

struct Row {
    question_id: String,
    query:       Vec<String>,
    sentence_id: String,
    sentence:    Vec<String>,
    label:       i64,
}

/// Rows of the query being read, as parallel lists.
struct PendingQuery {
    question_id:  String,
    query:        Vec<String>,
    sentences:    Vec<Vec<String>>,
    labels:       Vec<i64>,
    sentence_ids: Vec<String>,
}

impl PendingQuery {
    fn start(row: Row) -> Self {
        let mut pending = Self {
            question_id:  row.question_id.clone(),
            query:        row.query.clone(),
            sentences:    Vec::new(),
            labels:       Vec::new(),
            sentence_ids: Vec::new(),
        };
        pending.push(row);
        pending
    }

    fn push(&mut self, row: Row) {
        self.sentences.push(row.sentence);
        self.labels.push(row.label);
        self.sentence_ids.push(row.sentence_id);
    }

    fn finish(self) -> Result<Sample, QaError> {
        Ok(Sample::from_parallel(self.query, self.sentences, self.labels)?
            .with_id(self.question_id)
            .with_document_ids(self.sentence_ids))
    }
}

impl<R: BufRead> Iterator for TsvSamples<R> {
    type Item = Result<Sample, QaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e))   => return self.fail(e.into()),
                None => {
                    self.done = true;
                    return self.current.take().map(PendingQuery::finish);
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() || (self.line_no == 1 && is_header(&line)) {
                continue;
            }

            let row = match parse_row(&line, self.line_no, &self.preprocessor) {
                Ok(row) => row,
                Err(e)  => return self.fail(e),
            };

            match &mut self.current {
                Some(pending) if pending.question_id == row.question_id => pending.push(row),
                _ => {
                    if let Some(finished) = self.current.replace(PendingQuery::start(row)) {
                        let sample = finished.finish();
                        self.done = sample.is_err();
                        return Some(sample);
                    }
                }
            }
        }
    }
}

fn is_header(line: &str) -> bool {
    line.split('\t')
        .next()
        .map(|c| c.trim().eq_ignore_ascii_case("QuestionID"))
        .unwrap_or(false)
}

fn parse_row(line: &str, line_no: usize, preprocessor: &Preprocessor) -> Result<Row, QaError> {
    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if cols.len() < NUM_COLUMNS {
        return Err(QaError::MalformedRecord {
            line:   line_no,
            reason: format!("expected {NUM_COLUMNS} tab-separated columns, found {}", cols.len()),
        });
    }

    let label: i64 = cols[COL_LABEL].trim().parse().map_err(|_| QaError::MalformedRecord {
        line:   line_no,
        reason: format!("label '{}' is not an integer", cols[COL_LABEL].trim()),
    })?;
    Relevance::try_from(label).map_err(|e| QaError::MalformedRecord {
        line:   line_no,
        reason: e.to_string(),
    })?;

    Ok(Row {
        question_id: cols[COL_QUESTION_ID].trim().to_string(),
        query:       preprocessor.tokenize(cols[COL_QUESTION]),
        sentence_id: cols[COL_SENTENCE_ID].trim().to_string(),
        sentence:    preprocessor.tokenize(cols[COL_SENTENCE]),
        label,
    })
}
