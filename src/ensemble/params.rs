//! Parameter addressing for hyperparameter search
//!
//! Top-level options use their field names. Learner hyperparameters are
//! addressed as `<name>__<param>`, where `<name>` is the learner's lowercase
//! type name, suffixed `-1`, `-2`, ... when the same type occurs more than
//! once. The meta learner is addressed as `meta-<name>__<param>`.

use super::meta_features::DropProbaColumn;
use super::stacking::{FoldStrategy, StackingCvClassifier};
use crate::error::{Result, StackingError};
use crate::training::{Classifier, ParamMap, ParamValue};
use std::collections::HashMap;

/// Addressable names of `learners`, in order
pub fn learner_names(learners: &[Box<dyn Classifier>]) -> Vec<String> {
    let names: Vec<String> = learners.iter().map(|l| l.name()).collect();
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in &names {
        *totals.entry(name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            if totals[name.as_str()] == 1 {
                return name.clone();
            }
            let n = seen.entry(name.as_str()).or_default();
            *n += 1;
            format!("{}-{}", name, n)
        })
        .collect()
}

fn meta_prefix(meta: &dyn Classifier) -> String {
    format!("meta-{}", meta.name())
}

impl StackingCvClassifier {
    /// Current parameters; with `deep`, every learner's own parameters too
    pub fn get_params(&self, deep: bool) -> ParamMap {
        let config = &self.config;
        let names = learner_names(&self.classifiers);

        let mut params = ParamMap::new();
        params.insert("classifiers".to_string(), ParamValue::List(names.clone()));
        params.insert(
            "meta_classifier".to_string(),
            ParamValue::Str(self.meta_classifier.name()),
        );
        // A splitter object reports its fold count, as it does when serialized
        params.insert("cv".to_string(), ParamValue::from(config.cv.n_splits()));
        params.insert("use_probas".to_string(), config.use_probas.into());
        let drop = config.drop_proba_col.map(|d| match d {
            DropProbaColumn::First => "first",
            DropProbaColumn::Last => "last",
        });
        params.insert("drop_proba_col".to_string(), drop.into());
        params.insert(
            "use_features_in_secondary".to_string(),
            config.use_features_in_secondary.into(),
        );
        params.insert("stratify".to_string(), config.stratify.into());
        params.insert("shuffle".to_string(), config.shuffle.into());
        params.insert("use_clones".to_string(), config.use_clones.into());
        params.insert(
            "store_train_meta_features".to_string(),
            config.store_train_meta_features.into(),
        );
        params.insert(
            "random_state".to_string(),
            config.random_state.map(|s| s as i64).into(),
        );
        params.insert("n_jobs".to_string(), config.n_jobs.into());
        params.insert("verbose".to_string(), (config.verbose as usize).into());

        if deep {
            for (name, learner) in names.iter().zip(&self.classifiers) {
                params.insert(name.clone(), ParamValue::Str(learner.name()));
                for (key, value) in learner.params() {
                    params.insert(format!("{}__{}", name, key), value);
                }
            }
            let meta_name = meta_prefix(self.meta_classifier.as_ref());
            for (key, value) in self.meta_classifier.params() {
                params.insert(format!("{}__{}", meta_name, key), value);
            }
            params.insert(meta_name, ParamValue::Str(self.meta_classifier.name()));
        }
        params
    }

    /// Apply parameters by name. Keys are applied in sorted order and the
    /// first invalid one aborts with `InvalidParameter`.
    pub fn set_params(&mut self, params: ParamMap) -> Result<()> {
        for (key, value) in params {
            match key.split_once("__") {
                Some((prefix, param)) => self.set_learner_param(&key, prefix, param, value)?,
                None => self.set_option(&key, value)?,
            }
        }
        Ok(())
    }

    fn set_learner_param(
        &mut self,
        key: &str,
        prefix: &str,
        param: &str,
        value: ParamValue,
    ) -> Result<()> {
        if prefix == meta_prefix(self.meta_classifier.as_ref()) {
            return self.meta_classifier.set_param(param, value);
        }
        let names = learner_names(&self.classifiers);
        match names.iter().position(|n| n == prefix) {
            Some(idx) => self.classifiers[idx].set_param(param, value),
            None => Err(value.invalid(key, &format!("no learner is named '{}'", prefix))),
        }
    }

    fn set_option(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let config = &mut self.config;
        match key {
            "cv" => match value {
                ParamValue::Int(_) => config.cv = FoldStrategy::Folds(value.as_usize(key)?),
                other => {
                    return Err(other.invalid(
                        key,
                        "expected a fold count; splitter objects are set through the config",
                    ))
                }
            },
            "use_probas" => config.use_probas = value.as_bool(key)?,
            "drop_proba_col" => {
                config.drop_proba_col = match &value {
                    ParamValue::None => None,
                    ParamValue::Str(s) if s == "first" => Some(DropProbaColumn::First),
                    ParamValue::Str(s) if s == "last" => Some(DropProbaColumn::Last),
                    _ => return Err(value.invalid(key, "expected None, 'first' or 'last'")),
                }
            }
            "use_features_in_secondary" => config.use_features_in_secondary = value.as_bool(key)?,
            "stratify" => config.stratify = value.as_bool(key)?,
            "shuffle" => config.shuffle = value.as_bool(key)?,
            "use_clones" => config.use_clones = value.as_bool(key)?,
            "store_train_meta_features" => {
                config.store_train_meta_features = value.as_bool(key)?
            }
            "random_state" => config.random_state = value.as_opt_u64(key)?,
            "n_jobs" => config.n_jobs = value.as_opt_usize(key)?,
            "verbose" => {
                config.verbose = u8::try_from(value.as_usize(key)?)
                    .map_err(|_| value.invalid(key, "must be at most 255"))?
            }
            "classifiers" | "meta_classifier" => {
                return Err(StackingError::InvalidParameter {
                    name: key.to_string(),
                    value: value.to_string(),
                    reason: "learners are replaced with set_classifiers / set_meta_classifier"
                        .to_string(),
                })
            }
            _ => {
                let is_learner = learner_names(&self.classifiers).iter().any(|n| n == key)
                    || key == meta_prefix(self.meta_classifier.as_ref());
                let reason = if is_learner {
                    "learners are replaced with set_classifiers / set_meta_classifier"
                } else {
                    "unknown parameter for StackingCvClassifier"
                };
                return Err(value.invalid(key, reason));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::StackingConfig;
    use crate::training::{
        GaussianNaiveBayes, KFold, KNNClassifier, LogisticRegression, RandomForest,
    };

    #[test]
    fn test_learner_names_disambiguate_duplicates() {
        let learners: Vec<Box<dyn Classifier>> = vec![
            Box::new(RandomForest::default()),
            Box::new(RandomForest::default()),
            Box::new(GaussianNaiveBayes::new()),
        ];
        assert_eq!(
            learner_names(&learners),
            vec!["randomforestclassifier-1", "randomforestclassifier-2", "gaussiannb"]
        );
    }

    #[test]
    fn test_shallow_params_have_no_learner_keys() {
        let sclf = StackingCvClassifier::new(
            vec![Box::new(KNNClassifier::with_k(1))],
            Box::new(LogisticRegression::new()),
        );
        let params = sclf.get_params(false);
        assert!(params.keys().all(|k| !k.contains("__")));
        assert_eq!(params["cv"], ParamValue::Int(5));
        assert_eq!(params["drop_proba_col"], ParamValue::None);
    }

    #[test]
    fn test_set_verbose_out_of_range() {
        let mut sclf = StackingCvClassifier::new(
            vec![Box::new(GaussianNaiveBayes::new())],
            Box::new(LogisticRegression::new()),
        );
        let err = sclf
            .set_params(ParamMap::from([("verbose".to_string(), ParamValue::Int(300))]))
            .unwrap_err();
        assert!(matches!(err, StackingError::InvalidParameter { .. }));
    }

    #[test]
    fn test_splitter_cv_reports_fold_count() {
        let mut sclf = StackingCvClassifier::new(
            vec![Box::new(GaussianNaiveBayes::new())],
            Box::new(LogisticRegression::new()),
        )
        .with_config(StackingConfig::new().with_splitter(KFold::new(2)));

        let cv = sclf.get_params(false)["cv"].clone();
        assert_eq!(cv, ParamValue::Int(2));

        // The reported value is accepted back
        sclf.set_params(ParamMap::from([("cv".to_string(), cv)])).unwrap();
        assert!(matches!(sclf.config().cv, FoldStrategy::Folds(2)));
    }
}
