use std::io::Write;

use vision::{FrameRecord, RunSummary};

/// Per-frame CSV rows followed by a summary block.
pub struct CsvReport<W: Write> {
    out: W,
    class_names: Vec<String>,
}

impl<W: Write> CsvReport<W> {
    pub fn new(mut out: W, class_names: &[String]) -> anyhow::Result<Self> {
        writeln!(
            out,
            "frame,processed,displayed,failed,raw_label,label,expected,correct,mode,uncertainty,spread,ma,sd,\
             roi_x,roi_y,roi_w,roi_h,capture_us,preprocessing_us,parallel_us,classification_us,uncertainty_us,smoothing_us"
        )?;

        Ok(Self {
            out,
            class_names: class_names.to_vec(),
        })
    }

    pub fn write_record(&mut self, record: &FrameRecord) -> anyhow::Result<()> {
        let name = |label: Option<usize>| {
            label
                .and_then(|l| self.class_names.get(l))
                .map(String::as_str)
                .unwrap_or("")
                .to_string()
        };
        let correct = match record.is_correct() {
            Some(true) => "correct",
            Some(false) => "wrong",
            None => "",
        };
        let (uncertainty, spread, ma, sd) = match &record.report {
            Some(r) => (
                r.primary.to_string(),
                r.spread.to_string(),
                r.moving_average.to_string(),
                r.moving_std.to_string(),
            ),
            None => Default::default(),
        };
        let roi = match record.roi {
            Some(r) => format!("{},{},{},{}", r.x(), r.y(), r.width(), r.height()),
            None => ",,,".to_string(),
        };
        let t = &record.timings;

        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            record.index,
            record.processed,
            record.displayed,
            record.failed,
            name(record.raw_label),
            name(Some(record.label)),
            name(record.expected),
            correct,
            record.mode.index(),
            uncertainty,
            spread,
            ma,
            sd,
            roi,
            t.capture.as_micros(),
            t.preprocessing.as_micros(),
            t.parallel.as_micros(),
            t.classification.as_micros(),
            t.uncertainty.as_micros(),
            t.smoothing.as_micros(),
        )?;

        Ok(())
    }

    pub fn write_summary(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "frames,processed,displayed,failed,accuracy,frame_rate,processing_rate,classification_rate,mean_classification_us,\
             mean_uncertainty_us,mean_uncertainty_per_classification_us,mean_smoothing_us,mean_smoothing_per_classification_us"
        )?;
        writeln!(
            self.out,
            "{},{},{},{},{},{:.2},{:.2},{:.2},{},{},{},{},{}",
            summary.frames,
            summary.processed,
            summary.displayed,
            summary.failed,
            summary.accuracy().map(|a| format!("{a:.2}")).unwrap_or_default(),
            summary.frame_rate(),
            summary.processing_rate(),
            summary.classification_rate(),
            summary.mean_classification_latency().as_micros(),
            summary.mean_uncertainty_time().as_micros(),
            summary.mean_uncertainty_latency().as_micros(),
            summary.mean_smoothing_time().as_micros(),
            summary.mean_smoothing_latency().as_micros(),
        )?;
        self.out.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vision::{FrameTimings, Mode, Region};

    use super::*;

    fn classes() -> Vec<String> {
        vision::CIFAR10_CLASSES.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn writes_header_rows_and_summary() {
        let record = FrameRecord {
            index: 4,
            processed: true,
            displayed: true,
            failed: false,
            label: 7,
            raw_label: Some(7),
            expected: Some(7),
            roi: Some(Region::from_corners(10, 20, 110, 100)),
            report: None,
            mode: Mode::Certain,
            timings: FrameTimings {
                classification: Duration::from_micros(250),
                uncertainty: Duration::from_micros(40),
                smoothing: Duration::from_micros(12),
                ..FrameTimings::default()
            },
        };
        let mut summary = RunSummary::default();
        summary.record(&record);

        let mut report = CsvReport::new(Vec::new(), &classes()).unwrap();
        report.write_record(&record).unwrap();
        report.write_summary(&summary).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("frame,processed,displayed"));
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
        assert!(lines[1].starts_with("4,true,true,false,horse,horse,horse,correct,1,,,,,10,20,100,80,"));
        assert!(lines[4].starts_with("1,1,1,0,100.00,"));
        assert_eq!(lines[3].split(',').count(), lines[4].split(',').count());
        assert!(lines[4].ends_with(",250,40,40,12,12"), "{}", lines[4]);
    }
}
