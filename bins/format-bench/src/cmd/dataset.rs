use format_api::Value;

/// One employee record. `hire_date` is an ISO-8601 date kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: i32,
    pub name: String,
    pub salary: i32,
    pub email: String,
    pub hire_date: String,
}

impl Employee {
    fn new(id: i32, name: &str, salary: i32, email: &str, hire_date: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            salary,
            email: email.to_string(),
            hire_date: hire_date.to_string(),
        }
    }
}

impl From<&Employee> for Value {
    fn from(e: &Employee) -> Self {
        [
            ("id", Value::from(i64::from(e.id))),
            ("name", Value::from(e.name.as_str())),
            ("salary", Value::from(i64::from(e.salary))),
            ("email", Value::from(e.email.as_str())),
            ("hireDate", Value::from(e.hire_date.as_str())),
        ]
        .into_iter()
        .collect()
    }
}

/// The fixed employee list every format encodes.
pub fn employees() -> Vec<Employee> {
    vec![
        Employee::new(1, "Ali", 9000, "ali@mail.com", "2022-01-15"),
        Employee::new(2, "Kamal", 22000, "kamal@mail.com", "2021-05-10"),
        Employee::new(3, "Amal", 23000, "amal@mail.com", "2020-09-20"),
    ]
}

/// `{"employee": [...]}`, the shape the `Employees` message expects.
pub fn to_value(employees: &[Employee]) -> Value {
    let items: Vec<Value> = employees.iter().map(Value::from).collect();
    [("employee", Value::from(items))].into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_records_in_source_order() {
        let ids: Vec<i32> = employees().iter().map(|e| e.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(employees()[1].name, "Kamal");
        assert_eq!(employees(), employees());
    }

    #[test]
    fn value_shape() {
        let value = to_value(&employees());
        let list = value.get("employee").and_then(Value::as_array).unwrap();
        assert_eq!(list.len(), 3);

        let keys: Vec<&str> = list[0].as_object().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["id", "name", "salary", "email", "hireDate"]);
        assert_eq!(list[2].get("salary").and_then(Value::as_i64), Some(23000));
        assert_eq!(list[2].get("hireDate").and_then(Value::as_str), Some("2020-09-20"));
    }
}
