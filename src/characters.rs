//! Character listing: one identity-only record per distinct speaker.

use crate::pipeline::{Station, StationError};
use crate::record::Record;
use std::collections::HashSet;

/// Emits each `(source_id, character_name)` the first time it is seen, with
/// an empty payload.
#[derive(Debug, Default)]
pub struct CharacterLister {
    seen: HashSet<(String, String)>,
}

impl CharacterLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct characters seen so far.
    pub fn count(&self) -> usize {
        self.seen.len()
    }
}

impl Station for CharacterLister {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, input: Record) -> Result<Option<Record>, StationError> {
        let key = (input.source_id, input.character_name);
        if self.seen.contains(&key) {
            return Ok(None);
        }
        self.seen.insert(key.clone());
        Ok(Some(Record::new(key.0, key.1, Vec::new(), input.form)))
    }

    fn name(&self) -> &'static str {
        "characters"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::testing::CollectingReporter;
    use crate::pipeline::{LineRunner, StreamSink};
    use crate::record::InputForm;

    #[test]
    fn lists_each_character_once_in_order() {
        let reporter = CollectingReporter::default();
        let runner = LineRunner::new(InputForm::Auto, &reporter);
        let mut sink = StreamSink::new(Vec::new());
        let mut lister = CharacterLister::new();

        let input = "A001 Hamlet to be\n\
                     A001 Ophelia my lord\n\
                     A001 Hamlet or not\n\
                     B002 Hamlet other play\n";
        let summary = runner.run(&mut lister, input.as_bytes(), &mut sink).unwrap();

        assert_eq!(summary.records_in, 4);
        assert_eq!(summary.records_out, 3);
        assert_eq!(lister.count(), 3);
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "A001 Hamlet\nA001 Ophelia\nB002 Hamlet\n"
        );
    }

    #[test]
    fn raw_names_keep_their_form() {
        let reporter = CollectingReporter::default();
        let runner = LineRunner::new(InputForm::Auto, &reporter);
        let mut sink = StreamSink::new(Vec::new());

        runner
            .run(
                &mut CharacterLister::new(),
                "A001\tFirst Witch\t<l>When</l>\n".as_bytes(),
                &mut sink,
            )
            .unwrap();

        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "A001\tFirst Witch\n"
        );
    }
}
