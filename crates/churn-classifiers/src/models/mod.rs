pub mod bagging;
pub mod decision_tree;
pub mod gbdt;
pub mod logistic;
pub mod random_forest;

pub mod classifier_trait;
pub mod factory;
