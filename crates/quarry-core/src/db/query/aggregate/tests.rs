use crate::{
    db::query::{
        ValidateError,
        aggregate::{
            AggregateFn, AggregateInputs, COUNT_ALL, GroupByInputs, GroupBySpec, Having,
            build_aggregates, build_group_by,
        },
        order::{Direction, OrderTarget},
        predicate::{CompareOp, Predicate},
    },
    model::ScalarType,
    test_support::test_schema,
    value::Value,
};
use proptest::prelude::*;
use serde_json::{Map, Value as Json, json};

fn group_by(by: Json, having: Option<Json>, order_by: Option<Json>) -> Result<GroupBySpec, ValidateError> {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    build_group_by(
        &schema,
        entity,
        GroupByInputs {
            by: &by,
            having: having.as_ref(),
            order_by: order_by.as_ref(),
            take: None,
            skip: None,
            aggregates: AggregateInputs::default(),
        },
    )
}

//
// Aggregate outputs
//

#[test]
fn count_true_selects_all_rows() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");
    let count = json!(true);
    let avg = json!({ "salary": true, "age": true });

    let selection = build_aggregates(
        entity,
        AggregateInputs {
            count: Some(&count),
            avg: Some(&avg),
            ..AggregateInputs::default()
        },
    )
    .expect("aggregates");

    assert_eq!(selection.count, vec![COUNT_ALL.to_string()]);
    assert_eq!(selection.avg, vec!["age".to_string(), "salary".to_string()]);
    assert_eq!(selection.pairs().count(), 3);
}

#[test]
fn sum_on_text_is_not_applicable() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");
    let sum = json!({ "name": true });

    let err = build_aggregates(
        entity,
        AggregateInputs {
            sum: Some(&sum),
            ..AggregateInputs::default()
        },
    )
    .expect_err("sum on text");

    assert!(matches!(
        err,
        ValidateError::AggregateNotApplicable { function: "_sum", ref field, .. } if field == "name"
    ));
}

#[test]
fn min_max_accept_orderable_fields_only() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    for (field, ok) in [("hiredAt", true), ("name", true), ("active", false), ("tags", false)] {
        let min = Json::Object([(field.to_string(), json!(true))].into_iter().collect());
        let result = build_aggregates(
            entity,
            AggregateInputs {
                min: Some(&min),
                ..AggregateInputs::default()
            },
        );
        assert_eq!(result.is_ok(), ok, "_min on {field}");
    }
}

#[test]
fn output_types_follow_numeric_rules() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    assert_eq!(
        AggregateFn::Avg.output_type(entity.field("age")),
        ScalarType::Float
    );
    assert_eq!(
        AggregateFn::Sum.output_type(entity.field("age")),
        ScalarType::Int
    );
    assert_eq!(
        AggregateFn::Avg.output_type(entity.field("salary")),
        ScalarType::Decimal
    );
    assert_eq!(AggregateFn::Count.output_type(None), ScalarType::Int);
}

//
// Group by
//

#[test]
fn empty_by_is_rejected() {
    let err = group_by(json!([]), None, None).expect_err("empty by");

    assert_eq!(err.to_string(), "by must not be empty ('Employee')");
}

#[test]
fn list_fields_cannot_be_grouping_keys() {
    let err = group_by(json!(["tags"]), None, None).expect_err("list key");

    assert!(matches!(err, ValidateError::GroupByInvalidField { ref field, .. } if field == "tags"));
}

#[test]
fn having_on_field_outside_by_names_the_field() {
    let err = group_by(
        json!(["status"]),
        Some(json!({ "name": "Ada" })),
        None,
    )
    .expect_err("having outside by");

    assert!(matches!(
        err,
        ValidateError::FieldNotInGroupBy { ref field, clause: "having", .. } if field == "name"
    ));
}

#[test]
fn having_accepts_aggregates_of_any_applicable_field() {
    let spec = group_by(
        json!("status"),
        Some(json!({ "salary": { "_avg": { "gt": 1000 } }, "status": "active" })),
        None,
    )
    .expect("group by");

    let Having::And(parts) = spec.having else {
        panic!("expected conjunction");
    };
    assert!(matches!(
        &parts[0],
        Having::Aggregate(cond)
            if cond.function == AggregateFn::Avg && cond.op == CompareOp::Gt && cond.field == "salary"
    ));
    assert_eq!(
        parts[1],
        Having::Key(Predicate::eq("status", Value::Enum("active".to_string())))
    );
}

#[test]
fn having_with_unknown_field_is_rejected() {
    let err = group_by(json!(["status"]), Some(json!({ "bonus": { "_sum": { "gt": 1 } } })), None)
        .expect_err("unknown");

    assert!(matches!(err, ValidateError::UnknownField { ref field, .. } if field == "bonus"));
}

#[test]
fn order_by_must_use_group_keys_or_aggregates() {
    let spec = group_by(
        json!(["status"]),
        None,
        Some(json!([{ "status": "asc" }, { "_count": { "_all": "desc" } }])),
    )
    .expect("order by keys and aggregates");

    assert_eq!(spec.order.len(), 2);
    assert_eq!(
        spec.order[1].target,
        OrderTarget::Aggregate {
            function: AggregateFn::Count,
            field: COUNT_ALL.to_string(),
        }
    );
    assert_eq!(spec.order[1].direction, Direction::Desc);

    let err = group_by(json!(["status"]), None, Some(json!({ "name": "asc" })))
        .expect_err("order outside by");
    assert!(matches!(
        err,
        ValidateError::FieldNotInGroupBy { clause: "orderBy", .. }
    ));
}

#[test]
fn pagination_requires_order_by() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");
    let by = json!(["status"]);

    let err = build_group_by(
        &schema,
        entity,
        GroupByInputs {
            by: &by,
            having: None,
            order_by: None,
            take: Some(2),
            skip: None,
            aggregates: AggregateInputs::default(),
        },
    )
    .expect_err("take without orderBy");

    assert!(matches!(err, ValidateError::PaginationWithoutOrder { .. }));
}

#[test]
fn aggregate_order_outside_group_by_is_rejected() {
    let schema = test_schema();
    let entity = schema.entity("Employee").expect("entity");

    let err = crate::db::query::order::build_order(
        &schema,
        entity,
        &json!({ "_count": { "_all": "asc" } }),
        false,
    )
    .expect_err("aggregate order in findMany");
    assert!(matches!(err, ValidateError::InvalidOrderBy { .. }));
}

//
// Containment
//

// Groupable Employee scalars.
const GROUPABLE: [&str; 13] = [
    "id",
    "employeeCode",
    "email",
    "name",
    "password",
    "status",
    "salary",
    "age",
    "rating",
    "active",
    "hiredAt",
    "updatedAt",
    "departmentId",
];

fn literal(field: &str) -> Json {
    match field {
        "id" | "departmentId" => json!(1),
        "status" => json!("active"),
        "salary" => json!("5000"),
        "age" => json!(30),
        "rating" => json!(4.5),
        "active" => json!(true),
        "hiredAt" | "updatedAt" => json!("2024-01-01T00:00:00Z"),
        _ => json!("Ada"),
    }
}

#[derive(Clone, Debug)]
struct GroupRequest {
    by: Vec<usize>,
    order: Vec<usize>,
    having: Vec<usize>,
    counted: Vec<usize>,
    order_by_count: bool,
    having_sum: bool,
}

impl GroupRequest {
    fn names(indices: &[usize]) -> Vec<&'static str> {
        indices.iter().map(|&i| GROUPABLE[i]).collect()
    }

    // Scalar references that fall outside the grouping keys.
    fn outside(&self) -> Vec<&'static str> {
        let by = Self::names(&self.by);

        Self::names(&self.order)
            .into_iter()
            .chain(Self::names(&self.having))
            .filter(|name| !by.contains(name))
            .collect()
    }

    fn build(&self) -> Result<GroupBySpec, ValidateError> {
        let schema = test_schema();
        let entity = schema.entity("Employee").expect("entity");

        let by = json!(Self::names(&self.by));

        let mut order: Vec<Json> = self
            .order
            .iter()
            .map(|&i| {
                let mut term = Map::new();
                term.insert(GROUPABLE[i].to_string(), json!("asc"));
                Json::Object(term)
            })
            .collect();
        if self.order_by_count {
            order.push(json!({ "_count": { "_all": "desc" } }));
        }
        let order_by = (!order.is_empty()).then(|| Json::Array(order));

        let mut conditions: Vec<Json> = self
            .having
            .iter()
            .map(|&i| {
                let mut condition = Map::new();
                condition.insert(GROUPABLE[i].to_string(), literal(GROUPABLE[i]));
                Json::Object(condition)
            })
            .collect();
        if self.having_sum {
            conditions.push(json!({ "salary": { "_sum": { "gte": 0 } } }));
        }
        let having = (!conditions.is_empty()).then(|| json!({ "AND": conditions }));

        let mut counted = Map::new();
        for &i in &self.counted {
            counted.insert(GROUPABLE[i].to_string(), json!(true));
        }
        let count = Json::Object(counted);
        let sum = json!({ "salary": true });

        build_group_by(
            &schema,
            entity,
            GroupByInputs {
                by: &by,
                having: having.as_ref(),
                order_by: order_by.as_ref(),
                take: None,
                skip: None,
                aggregates: AggregateInputs {
                    count: Some(&count),
                    sum: self.having_sum.then_some(&sum),
                    ..AggregateInputs::default()
                },
            },
        )
    }
}

fn arb_group_request() -> impl Strategy<Value = GroupRequest> {
    let indices: Vec<usize> = (0..GROUPABLE.len()).collect();
    let refs = || prop::collection::vec(0..GROUPABLE.len(), 0..4);

    (
        prop::sample::subsequence(indices, 1..=4),
        refs(),
        refs(),
        refs(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(by, order, having, counted, order_by_count, having_sum)| GroupRequest {
                by,
                order,
                having,
                counted,
                order_by_count,
                having_sum,
            },
        )
}

proptest! {
    #[test]
    fn scalar_references_must_be_grouping_keys(request in arb_group_request()) {
        let outside = request.outside();

        match request.build() {
            Ok(spec) => {
                prop_assert!(outside.is_empty(), "accepted references outside by: {:?}", outside);
                prop_assert_eq!(spec.by, GroupRequest::names(&request.by));
            }
            Err(ValidateError::FieldNotInGroupBy { field, .. }) => {
                prop_assert!(outside.contains(&field.as_str()), "rejected grouping key {}", field);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
