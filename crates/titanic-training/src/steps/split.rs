use super::{FEATURES, SPLIT_SEED, TARGET, TEST_SIZE};
use crate::error::{TrainingError, TrainingResult};
use crate::handle::{DatasetHandle, FeaturesHandle, Handle, TargetHandle};
use crate::table::Frame;
use crate::tracker::ActiveRun;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitHandles {
    pub xtrain: FeaturesHandle,
    pub xtest: FeaturesHandle,
    pub ytrain: TargetHandle,
    pub ytest: TargetHandle,
}

/// The four split tables before they are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFrames {
    pub xtrain: Frame,
    pub xtest: Frame,
    pub ytrain: Frame,
    pub ytest: Frame,
}

impl SplitFrames {
    fn check(&self, source_rows: usize) -> TrainingResult<()> {
        if self.xtrain.len() + self.xtest.len() != source_rows {
            return Err(TrainingError::SchemaMismatch(format!(
                "split lost rows: {} + {} != {source_rows}",
                self.xtrain.len(),
                self.xtest.len()
            )));
        }
        if self.xtrain.len() != self.ytrain.len() || self.xtest.len() != self.ytest.len() {
            return Err(TrainingError::SchemaMismatch("features and targets are not row-aligned".to_string()));
        }
        for x in [&self.xtrain, &self.xtest] {
            if x.columns() != FEATURES {
                return Err(TrainingError::SchemaMismatch(format!("unexpected feature columns {:?}", x.columns())));
            }
        }
        for y in [&self.ytrain, &self.ytest] {
            if y.columns() != [TARGET] {
                return Err(TrainingError::SchemaMismatch(format!("unexpected target columns {:?}", y.columns())));
            }
        }
        Ok(())
    }
}

/// Seeded shuffle; the first `ceil(n * TEST_SIZE)` rows are the test set.
pub fn split_frame(frame: &Frame) -> TrainingResult<SplitFrames> {
    let n = frame.len();
    if n < 2 {
        return Err(TrainingError::SchemaMismatch(format!("need at least 2 rows to split, got {n}")));
    }
    let features = frame.select(&FEATURES)?;
    let target = frame.select(&[TARGET])?;

    let n_test = ((n as f64 * TEST_SIZE).ceil() as usize).clamp(1, n - 1);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));
    let (test_idx, train_idx) = order.split_at(n_test);

    let split = SplitFrames {
        xtrain: features.take(train_idx),
        xtest: features.take(test_idx),
        ytrain: target.take(train_idx),
        ytest: target.take(test_idx),
    };
    split.check(n)?;
    Ok(split)
}

/// Split the dataset behind `dataset` and log `xtrain`, `xtest`, `ytrain`,
/// `ytest` in that order.
pub fn split_train_test(run: &ActiveRun, dataset: &DatasetHandle) -> TrainingResult<SplitHandles> {
    let path = run.download_artifacts(dataset)?;
    let frame = Frame::read_csv(&path)?;
    let split = split_frame(&frame)?;
    debug!(train = split.xtrain.len(), test = split.xtest.len(), "split computed");

    let temp = TempDir::new()?;
    let write = |frame: &Frame, name: &str| -> TrainingResult<std::path::PathBuf> {
        let path = temp.path().join(format!("{name}.csv"));
        frame.write_csv(&path)?;
        Ok(path)
    };
    let staged = [
        write(&split.xtrain, "xtrain")?,
        write(&split.xtest, "xtest")?,
        write(&split.ytrain, "ytrain")?,
        write(&split.ytest, "ytest")?,
    ];

    let logged = run.log_artifacts(&[
        (staged[0].as_path(), "xtrain"),
        (staged[1].as_path(), "xtest"),
        (staged[2].as_path(), "ytrain"),
        (staged[3].as_path(), "ytest"),
    ])?;
    let [xtrain, xtest, ytrain, ytest]: [String; 4] = logged
        .try_into()
        .map_err(|_| TrainingError::Tracking("tracker did not log four split artifacts".to_string()))?;
    let handles = SplitHandles {
        xtrain: Handle::new(xtrain),
        xtest: Handle::new(xtest),
        ytrain: Handle::new(ytrain),
        ytest: Handle::new(ytest),
    };
    info!(
        run_id = run.run_id(),
        train_rows = split.xtrain.len(),
        test_rows = split.xtest.len(),
        "train/test split logged"
    );
    Ok(handles)
}
