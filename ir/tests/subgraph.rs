use xir::{ir, OpsetExtension, Weights};
use xir_core::ops::framework::FrameworkNode;
use xir_core::ops::scan::{InputDescription, Loop, OutputDescription, TensorIterator};
use xir_core::ops::state::{Assign, ReadValue};
use xir_core::prelude::*;
use xir_core::IrError;
use std::collections::HashMap;
use std::sync::Arc;

fn load(xml: &str) -> Function {
    let _ = env_logger::Builder::from_env("XIR_LOG").try_init();
    ir().convert(xml, Weights::new(vec![])).unwrap()
}

const BODY: &str = r#"
      <body>
        <layers>
          <layer id="5" name="body_in" type="Parameter" version="opset1">
            <data shape="1,4" element_type="f32"/>
            <output><port id="0" precision="FP32"><dim>1</dim><dim>4</dim></port></output>
          </layer>
          <layer id="7" name="body_relu" type="ReLU" version="opset1">
            <input><port id="0"><dim>1</dim><dim>4</dim></port></input>
            <output><port id="1" precision="FP32"><dim>1</dim><dim>4</dim></port></output>
          </layer>
          <layer id="9" name="body_out" type="Result" version="opset1">
            <input><port id="0"><dim>1</dim><dim>4</dim></port></input>
          </layer>
        </layers>
        <edges>
          <edge from-layer="5" from-port="0" to-layer="7" to-port="0"/>
          <edge from-layer="7" from-port="1" to-layer="9" to-port="0"/>
        </edges>
      </body>"#;

fn subgraph_net(op: &str, version: &str, port_map: &str, back_edges: &str) -> String {
    format!(
        r#"
<net name="sub" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="5,4" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>5</dim><dim>4</dim></port></output>
    </layer>
    <layer id="1" name="iter" type="{op}" version="{version}">
      <input><port id="0"><dim>5</dim><dim>4</dim></port></input>
      <output><port id="1" precision="FP32"><dim>5</dim><dim>4</dim></port></output>
      <port_map>
{port_map}
      </port_map>
      {back_edges}
{body}
    </layer>
    <layer id="2" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>5</dim><dim>4</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
    <edge from-layer="1" from-port="1" to-layer="2" to-port="0"/>
  </edges>
</net>"#,
        body = BODY,
    )
}

#[test]
fn loop_with_sliced_input_and_concat_output() {
    let xml = subgraph_net(
        "Loop",
        "opset5",
        r#"        <input external_port_id="0" internal_layer_id="5" axis="0"/>
        <output external_port_id="1" internal_layer_id="9" axis="0"/>"#,
        "<back_edges/>",
    );
    let function = load(&xml);
    let node = function.node_by_name("iter").unwrap();
    let looop = node.op_as::<Loop>().unwrap();
    assert!(looop.body.is_some());
    assert_eq!(
        looop.input_descriptions,
        [InputDescription::Slice {
            external_port_id: 0,
            body_parameter_index: 0,
            start: 0,
            stride: 1,
            part_size: 1,
            end: -1,
            axis: 0,
        }]
    );
    assert_eq!(
        looop.output_descriptions,
        [OutputDescription::Concat {
            body_result_index: 0,
            output_index: 0,
            start: 0,
            stride: 1,
            part_size: 1,
            end: -1,
            axis: 0,
        }]
    );
    assert_eq!(looop.special_body_ports.current_iteration_input_idx, -1);
    assert_eq!(looop.special_body_ports.body_condition_output_idx, -1);
    // Iteration count is a runtime quantity: the concat axis is dynamic.
    let fact = function.outlet_fact(OutletId::new(node.id, 0)).unwrap();
    assert_eq!(fact.shape, PartialShape::new([-1, 4]));
}

#[test]
fn axis_wins_over_back_edge() {
    let xml = subgraph_net(
        "TensorIterator",
        "opset1",
        r#"        <input external_port_id="0" internal_layer_id="5" axis="0"/>
        <output external_port_id="1" internal_layer_id="9"/>"#,
        r#"<back_edges><edge from-layer="9" to-layer="5"/></back_edges>"#,
    );
    let function = load(&xml);
    let ti = function.node_by_name("iter").unwrap().op_as::<TensorIterator>().unwrap();
    assert!(matches!(ti.input_descriptions[0], InputDescription::Slice { .. }));
}

#[test]
fn back_edge_without_axis_is_a_merged_input() {
    let xml = subgraph_net(
        "TensorIterator",
        "opset1",
        r#"        <input external_port_id="0" internal_layer_id="5"/>
        <output external_port_id="1" internal_layer_id="9"/>"#,
        r#"<back_edges><edge from-layer="9" to-layer="5"/></back_edges>"#,
    );
    let function = load(&xml);
    let ti = function.node_by_name("iter").unwrap().op_as::<TensorIterator>().unwrap();
    assert_eq!(
        ti.input_descriptions,
        [InputDescription::Merged {
            external_port_id: 0,
            body_parameter_index: 0,
            body_result_index: 0,
        }]
    );
    assert_eq!(
        ti.output_descriptions,
        [OutputDescription::Body { body_result_index: 0, output_index: 0, iteration: -1 }]
    );
}

#[test]
fn negative_external_output_port_is_skipped_without_numbering() {
    let xml = subgraph_net(
        "TensorIterator",
        "opset1",
        r#"        <input external_port_id="0" internal_layer_id="5" axis="0"/>
        <output external_port_id="-1" internal_layer_id="9"/>
        <output external_port_id="1" internal_layer_id="9" axis="0"/>"#,
        "<back_edges/>",
    );
    let function = load(&xml);
    let ti = function.node_by_name("iter").unwrap().op_as::<TensorIterator>().unwrap();
    assert_eq!(ti.output_descriptions.len(), 1);
    assert!(matches!(
        ti.output_descriptions[0],
        OutputDescription::Concat { output_index: 0, body_result_index: 0, .. }
    ));
}

#[test]
fn sub_graph_operator_without_a_body_is_fatal() {
    let xml = subgraph_net(
        "TensorIterator",
        "opset1",
        r#"        <input external_port_id="0" internal_layer_id="5" axis="0"/>
        <output external_port_id="1" internal_layer_id="9" axis="0"/>"#,
        "<back_edges/>",
    )
    .replace(BODY, "");
    let err = ir().convert(&xml, Weights::new(vec![])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::MissingBody(_)));
}

#[test]
fn assign_control_depends_on_its_read_value() {
    let xml = r#"
<net name="state" version="10">
  <layers>
    <layer id="0" name="init" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="3" name="state" type="ReadValue" version="opset3">
      <data variable_id="v"/>
      <input><port id="0"><dim>1</dim></port></input>
      <output><port id="1" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="5" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
    <layer id="9" name="save" type="Assign" version="opset3">
      <data variable_id="v"/>
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="3" to-port="0"/>
    <edge from-layer="3" from-port="1" to-layer="5" to-port="0"/>
    <edge from-layer="3" from-port="1" to-layer="9" to-port="0"/>
  </edges>
</net>"#;
    let function = load(xml);
    let read = function.node_by_name("state").unwrap();
    let save = function.node_by_name("save").unwrap();
    assert_eq!(function.sinks, [save.id]);
    assert_eq!(save.control_inputs, [read.id]);
    // Both ends share one Variable instance.
    let read_var = read.op_as::<ReadValue>().unwrap().variable.clone().unwrap();
    let save_var = save.op_as::<Assign>().unwrap().variable.clone().unwrap();
    assert!(Arc::ptr_eq(&read_var, &save_var));
    assert_eq!(read_var.id, "v");
    // The sink keeps the Assign live in the evaluation order.
    let order = function.eval_order().unwrap();
    assert!(order.contains(&save.id));
}

#[test]
fn assign_without_read_value_is_an_undefined_variable() {
    let xml = r#"
<net name="state" version="10">
  <layers>
    <layer id="0" name="init" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="9" name="save" type="Assign" version="opset3">
      <data variable_id="v"/>
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="9" to-port="0"/>
  </edges>
</net>"#;
    let err = ir().convert(xml, Weights::new(vec![])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::UndefinedVariable(_)));
}

const UNKNOWN_OP: &str = r#"
<net name="foo" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1,3" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim><dim>3</dim></port></output>
    </layer>
    <layer id="1" name="mystery" type="Foo" version="opset99">
      <data alpha="0.1" beta="2"/>
      <input><port id="0"><dim>1</dim><dim>3</dim></port></input>
      <output><port id="1" precision="FP16"><dim>1</dim><dim>3</dim></port></output>
    </layer>
    <layer id="2" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim><dim>3</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
    <edge from-layer="1" from-port="1" to-layer="2" to-port="0"/>
  </edges>
</net>"#;

#[test]
fn unknown_opset_without_fallback_is_fatal() {
    let err = ir().convert(UNKNOWN_OP, Weights::new(vec![])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::UnknownOpset(_)));
}

#[test]
fn framework_node_fallback_keeps_the_unknown_op() {
    let frontend = ir()
        .with_opset_extension(OpsetExtension {
            description: "framework_node_ext".to_string(),
            opsets: HashMap::new(),
        })
        .unwrap();
    let function = frontend.convert(UNKNOWN_OP, Weights::new(vec![])).unwrap();
    let node = function.node_by_name("mystery").unwrap();
    let fw = node.op_as::<FrameworkNode>().unwrap();
    assert_eq!(fw.attrs.type_name, "Foo");
    assert_eq!(fw.attrs.opset_name, "opset99");
    assert_eq!(fw.attrs.attrs.get("alpha").map(|s| s.as_str()), Some("0.1"));
    assert_eq!(fw.attrs.attrs.get("beta").map(|s| s.as_str()), Some("2"));
    // Output facts come from the declared port, not from inference.
    let fact = function.outlet_fact(OutletId::new(node.id, 0)).unwrap();
    assert_eq!(fact.element_type, ElementType::F16);
    assert_eq!(fact.shape, PartialShape::new([1, 3]));
}

#[test]
fn unknown_operator_in_a_known_opset_stays_fatal() {
    let xml = UNKNOWN_OP.replace("opset99", "opset1");
    let mut frontend = ir();
    frontend.enable_framework_node(true);
    let err = frontend.convert(&xml, Weights::new(vec![])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::UnknownOperator(_)));
}

#[test]
fn extension_colliding_with_builtin_opset_is_fatal() {
    let mut opsets = HashMap::new();
    opsets.insert("opset1".to_string(), Opset::default());
    assert!(ir()
        .with_opset_extension(OpsetExtension { description: String::new(), opsets })
        .is_err());
}
