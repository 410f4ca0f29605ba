use xir::{ir, Weights};
use xir_core::ops::io::{Parameter, Result_};
use xir_core::ops::konst::Constant;
use xir_core::ops::nn::Mvn;
use xir_core::prelude::*;
use xir_core::IrError;

fn load(xml: &str) -> Function {
    let _ = env_logger::Builder::from_env("XIR_LOG").try_init();
    ir().convert(xml, Weights::new(vec![])).unwrap()
}

fn err_kind(xml: &str) -> IrError {
    let _ = env_logger::Builder::from_env("XIR_LOG").try_init();
    let err = ir().convert(xml, Weights::new(vec![])).unwrap_err();
    err.downcast::<IrError>().unwrap()
}

const IDENTITY: &str = r#"
<net name="identity" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1,3" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim><dim>3</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim><dim>3</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
  </edges>
</net>"#;

#[test]
fn trivial_identity() {
    let function = load(IDENTITY);
    assert_eq!(function.name, "identity");
    assert_eq!(function.nodes().len(), 2);
    assert_eq!(function.parameters.len(), 1);
    assert_eq!(function.results.len(), 1);
    let result = function.node(function.results[0]);
    assert!(result.op_is::<Result_>());
    assert_eq!(result.inputs, [OutletId::new(function.parameters[0], 0)]);
    let fact = function.outlet_fact(OutletId::new(function.parameters[0], 0)).unwrap();
    assert_eq!(fact.element_type, ElementType::F32);
    assert_eq!(fact.shape, PartialShape::new([1, 3]));
}

#[test]
fn constant_shares_the_weights_blob() {
    let xml = r#"
<net name="const" version="10">
  <layers>
    <layer id="0" name="c" type="Const" version="opset1">
      <data offset="0" size="8" element_type="f32" shape="2"/>
      <output><port id="0" precision="FP32"><dim>2</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>2</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
  </edges>
</net>"#;
    let blob = vec![0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x40];
    let weights = Weights::new(blob.clone());
    let function = ir().convert(xml, weights.clone()).unwrap();
    let node = function.node_by_name("c").unwrap();
    let constant = node.op_as::<Constant>().unwrap();
    assert_eq!(constant.element_type, ElementType::F32);
    assert_eq!(&*constant.shape, [2]);
    let buffer = constant.buffer().unwrap();
    assert_eq!(buffer.as_bytes(), &blob[..]);
    // Shared view, not a copy.
    assert!(buffer.shared_owner().unwrap().same_blob(&weights));
    assert_eq!(buffer.as_bytes().as_ptr(), weights.as_ptr());
    let fact = function.outlet_fact(OutletId::new(node.id, 0)).unwrap();
    assert_eq!(fact.shape, PartialShape::new([2]));
}

#[test]
fn weight_slice_out_of_blob_is_rejected() {
    let xml = r#"
<net name="const" version="10">
  <layers>
    <layer id="0" name="c" type="Const" version="opset1">
      <data offset="4" size="8" element_type="f32" shape="2"/>
      <output><port id="0" precision="FP32"><dim>2</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>2</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="0" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    let err = ir().convert(xml, Weights::new(vec![0; 8])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::InsufficientWeights(_)));
}

#[test]
fn weight_size_inconsistent_with_shape_is_rejected() {
    let xml = r#"
<net name="const" version="10">
  <layers>
    <layer id="0" name="c" type="Const" version="opset1">
      <data offset="0" size="4" element_type="f32" shape="2"/>
      <output><port id="0" precision="FP32"><dim>2</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>2</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="0" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    let err = ir().convert(xml, Weights::new(vec![0; 8])).unwrap_err();
    assert!(matches!(err.downcast::<IrError>().unwrap(), IrError::InconsistentWeightSize(_)));
}

fn mvn_net(version: &str, across_channels: &str) -> String {
    format!(
        r#"
<net name="mvn" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1,3,8" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim><dim>3</dim><dim>8</dim></port></output>
    </layer>
    <layer id="1" name="norm" type="MVN" version="{version}">
      <data across_channels="{across_channels}" normalize_variance="1" eps="0.001"/>
      <input><port id="0"><dim>1</dim><dim>3</dim><dim>8</dim></port></input>
      <output><port id="1" precision="FP32"><dim>1</dim><dim>3</dim><dim>8</dim></port></output>
    </layer>
    <layer id="2" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim><dim>3</dim><dim>8</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
    <edge from-layer="1" from-port="1" to-layer="2" to-port="0"/>
  </edges>
</net>"#
    )
}

#[test]
fn mvn_at_opset1_falls_back_to_opset2() {
    let function = load(&mvn_net("opset1", "1"));
    let node = function.node_by_name("norm").unwrap();
    let mvn = node.op_as::<Mvn>().unwrap();
    assert!(mvn.across_channels);
    assert!(mvn.normalize_variance);
    assert_eq!(mvn.eps, 0.001);
}

#[test]
fn unrecognized_bool_spelling_keeps_the_default() {
    let function = load(&mvn_net("opset2", "banana"));
    let mvn = function.node_by_name("norm").unwrap().op_as::<Mvn>().unwrap();
    assert!(!mvn.across_channels);
}

#[test]
fn loading_twice_yields_isomorphic_graphs() {
    let a = load(&mvn_net("opset2", "true"));
    let b = load(&mvn_net("opset2", "true"));
    assert_eq!(a.nodes().len(), b.nodes().len());
    for (na, nb) in a.nodes().iter().zip(b.nodes()) {
        assert_eq!(na.op.name(), nb.op.name());
        assert_eq!(na.name, nb.name);
        assert_eq!(na.inputs, nb.inputs);
    }
}

#[test]
fn eval_order_is_topological() {
    let function = load(&mvn_net("opset2", "1"));
    let order = function.eval_order().unwrap();
    assert_eq!(order.len(), 3);
    for &id in &order {
        let position = order.iter().position(|&o| o == id).unwrap();
        for input in &function.node(id).inputs {
            let pred = order.iter().position(|&o| o == input.node).unwrap();
            assert!(pred < position);
        }
    }
}

#[test]
fn wiring_uses_positional_port_indices() {
    // Input port ids are declared as [7,3,9]; an edge to port 3 must land
    // on the second slot.
    let xml = r#"
<net name="concat" version="10">
  <layers>
    <layer id="0" name="a" type="Parameter" version="opset1">
      <data shape="1,2" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim><dim>2</dim></port></output>
    </layer>
    <layer id="1" name="b" type="Parameter" version="opset1">
      <data shape="2,2" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>2</dim><dim>2</dim></port></output>
    </layer>
    <layer id="2" name="c" type="Parameter" version="opset1">
      <data shape="3,2" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>3</dim><dim>2</dim></port></output>
    </layer>
    <layer id="3" name="cat" type="Concat" version="opset1">
      <data axis="0"/>
      <input>
        <port id="7"><dim>1</dim><dim>2</dim></port>
        <port id="3"><dim>2</dim><dim>2</dim></port>
        <port id="9"><dim>3</dim><dim>2</dim></port>
      </input>
      <output><port id="10" precision="FP32"><dim>6</dim><dim>2</dim></port></output>
    </layer>
    <layer id="4" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>6</dim><dim>2</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="3" to-port="7"/>
    <edge from-layer="1" from-port="0" to-layer="3" to-port="3"/>
    <edge from-layer="2" from-port="0" to-layer="3" to-port="9"/>
    <edge from-layer="3" from-port="10" to-layer="4" to-port="0"/>
  </edges>
</net>"#;
    let function = load(xml);
    let cat = function.node_by_name("cat").unwrap();
    let b = function.node_by_name("b").unwrap();
    assert_eq!(cat.inputs[1], OutletId::new(b.id, 0));
    let fact = function.outlet_fact(OutletId::new(cat.id, 0)).unwrap();
    assert_eq!(fact.shape, PartialShape::new([6, 2]));
}

#[test]
fn dynamic_dimension_is_accepted_below_minus_one_is_not() {
    let xml = r#"
<net name="dyn" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="-1,3" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>-1</dim><dim>3</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>-1</dim><dim>3</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="0" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    let function = load(xml);
    let fact = function.outlet_fact(OutletId::new(function.parameters[0], 0)).unwrap();
    assert_eq!(fact.shape, PartialShape::new([-1, 3]));
    assert!(!fact.shape.is_static());

    let bad = xml.replace("-1", "-2");
    assert!(matches!(err_kind(&bad), IrError::InvalidDimension(_)));
}

#[test]
fn duplicate_names_are_rejected_except_for_results() {
    let xml = r#"
<net name="dup" version="10">
  <layers>
    <layer id="0" name="x" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="1" name="x" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
  </layers>
  <edges/>
</net>"#;
    assert!(matches!(err_kind(xml), IrError::DuplicateName(_)));

    let xml = r#"
<net name="dup" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="1" name="out" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
    <layer id="2" name="out" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="1" to-port="0"/>
    <edge from-layer="0" from-port="0" to-layer="2" to-port="0"/>
  </edges>
</net>"#;
    let function = load(xml);
    assert_eq!(function.results.len(), 2);
}

#[test]
fn edge_to_undeclared_port_is_inconsistent() {
    // The Result layer only declares input port 0.
    let xml = IDENTITY.replace("to-port=\"0\"", "to-port=\"5\"");
    assert!(matches!(err_kind(&xml), IrError::InconsistentPortCount(_)));
}

#[test]
fn dangling_edge_is_reported() {
    let xml = r#"
<net name="dangling" version="10">
  <layers>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="7" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    assert!(matches!(err_kind(xml), IrError::DanglingEdge(_)));
}

#[test]
fn tensor_names_with_escaped_commas_land_on_the_outlet() {
    let xml = r#"
<net name="names" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1" element_type="f32"/>
      <output><port id="0" precision="FP32" names="plain,with\,comma"><dim>1</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="0" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    let function = load(xml);
    let names = &function.node(function.parameters[0]).outputs[0].names;
    assert!(names.contains("plain"));
    assert!(names.contains("with,comma"));
    assert_eq!(names.len(), 2);
}

#[test]
fn runtime_hints_are_kept_on_the_node() {
    let xml = r#"
<net name="hints" version="10">
  <layers>
    <layer id="0" name="input" type="Parameter" version="opset1">
      <data shape="1" element_type="f32" PrimitivesPriority="cpu:ref_any"/>
      <output><port id="0" precision="FP32"><dim>1</dim></port></output>
    </layer>
    <layer id="1" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>1</dim></port></input>
    </layer>
  </layers>
  <edges><edge from-layer="0" from-port="0" to-layer="1" to-port="0"/></edges>
</net>"#;
    let function = load(xml);
    let node = function.node(function.parameters[0]);
    assert_eq!(node.rt_info.get("PrimitivesPriority").map(|s| s.as_str()), Some("cpu:ref_any"));
    assert!(node.op_is::<Parameter>());
}

#[test]
fn gru_cell_from_experimental_version_lands_in_opset6() {
    let xml = r#"
<net name="gru" version="10">
  <layers>
    <layer id="0" name="x" type="Parameter" version="opset1">
      <data shape="2,3" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>2</dim><dim>3</dim></port></output>
    </layer>
    <layer id="1" name="h" type="Parameter" version="opset1">
      <data shape="2,4" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>2</dim><dim>4</dim></port></output>
    </layer>
    <layer id="2" name="w" type="Parameter" version="opset1">
      <data shape="12,3" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>12</dim><dim>3</dim></port></output>
    </layer>
    <layer id="3" name="r" type="Parameter" version="opset1">
      <data shape="12,4" element_type="f32"/>
      <output><port id="0" precision="FP32"><dim>12</dim><dim>4</dim></port></output>
    </layer>
    <layer id="4" name="cell" type="GRUCell" version="experimental">
      <data hidden_size="4" linear_before_reset="1"/>
      <input>
        <port id="0"><dim>2</dim><dim>3</dim></port>
        <port id="1"><dim>2</dim><dim>4</dim></port>
        <port id="2"><dim>12</dim><dim>3</dim></port>
        <port id="3"><dim>12</dim><dim>4</dim></port>
      </input>
      <output><port id="4" precision="FP32"><dim>2</dim><dim>4</dim></port></output>
    </layer>
    <layer id="5" name="output" type="Result" version="opset1">
      <input><port id="0"><dim>2</dim><dim>4</dim></port></input>
    </layer>
  </layers>
  <edges>
    <edge from-layer="0" from-port="0" to-layer="4" to-port="0"/>
    <edge from-layer="1" from-port="0" to-layer="4" to-port="1"/>
    <edge from-layer="2" from-port="0" to-layer="4" to-port="2"/>
    <edge from-layer="3" from-port="0" to-layer="4" to-port="3"/>
    <edge from-layer="4" from-port="4" to-layer="5" to-port="0"/>
  </edges>
</net>"#;
    let function = load(xml);
    let cell = function.node_by_name("cell").unwrap();
    let gru = cell.op_as::<xir_core::ops::nn::GruCell>().unwrap();
    assert_eq!(gru.hidden_size, 4);
    assert!(gru.linear_before_reset);
    let fact = function.outlet_fact(OutletId::new(cell.id, 0)).unwrap();
    assert_eq!(fact.shape, PartialShape::new([2, 4]));
}
