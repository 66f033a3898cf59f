/// Shape text shared by the document tests
///
/// Two LOD levels: 200 holds a 4-vertex quad (`[0,1,2, 1,2,3]`), 500 holds a
/// sub-object with two trilists on different prim states.
pub(crate) const TRACK_SHAPE: &str = r#"SIMISA@@@@@@@@@@JINX0s1t______

shape (
	shape_header ( 00000000 00000000 )
	volumes ( 1
		vol_sphere (
			vector ( 0 0.5 5 ) 6
		)
	)
	shader_names ( 1
		named_shader ( TexDiff )
	)
	texture_filter_names ( 1
		named_filter_mode ( MipLinear )
	)
	points ( 5
		point ( -1 0 0 )
		point ( 1 0 0 )
		point ( -1 0 10 )
		point ( 1 0 10 )
		point ( 0 1 0 )
	)
	uv_points ( 4
		uv_point ( 0 0 )
		uv_point ( 1 0 )
		uv_point ( 0 1 )
		uv_point ( 1 1 )
	)
	normals ( 2
		vector ( 0 1 0 )
		vector ( 0 0 1 )
	)
	sort_vectors ( 0 )
	colours ( 0 )
	matrices ( 2
		matrix MAIN ( 1 0 0 0 1 0 0 0 1 0 0 0 )
		matrix WHEEL ( 1 0 0 0 1 0 0 0 1 0 0.5 2 )
	)
	images ( 2
		image ( ballast.ace )
		image ( "rail top.ace" )
	)
	textures ( 2
		texture ( 0 0 0 ff000000 )
		texture ( 1 0 0 ff000000 )
	)
	light_materials ( 0 )
	light_model_cfgs ( 1
		light_model_cfg ( 00000000
			uv_ops ( 1
				uv_op_copy ( 1 0 )
			)
		)
	)
	vtx_states ( 2
		vtx_state ( 00000000 0 -5 0 00000002 )
		vtx_state ( 00000000 1 -5 0 00000002 )
	)
	prim_states ( 3
		prim_state mt_ballast ( 00000000 0
			tex_idxs ( 1 0 ) 0 0 0 0 1
		)
		prim_state mt_rail ( 00000000 0
			tex_idxs ( 1 1 ) 0 1 0 0 1
		)
		prim_state mt_ballast ( 00000000 0
			tex_idxs ( 0 ) 0 0 0 0 1
		)
	)
	lod_controls ( 1
		lod_control (
			distance_levels_header ( 0 )
			distance_levels ( 2
				distance_level (
					distance_level_header (
						dlevel_selection ( 200 )
						hierarchy ( 2 -1 0 )
					)
					sub_objects ( 1
						sub_object (
							sub_object_header ( 00000400 -1 -1 000001d2 000001c4
								geometry_info ( 2 1 0 6 0 0 1 0 0 0
									geometry_nodes ( 1
										geometry_node ( 1 0 0 0 0
											cullable_prims ( 1 2 6 )
										)
									)
									geometry_node_map ( 2 0 -1 )
								)
								subobject_shaders ( 1 0 )
								subobject_light_cfgs ( 1 0 ) 0
							)
							vertices ( 4
								vertex ( 00000000 0 0 ff969696 ff808080
									vertex_uvs ( 1 0 )
								)
								vertex ( 00000000 1 0 ff969696 ff808080
									vertex_uvs ( 1 1 )
								)
								vertex ( 00000000 2 0 ff969696 ff808080
									vertex_uvs ( 1 2 )
								)
								vertex ( 00000000 3 0 ff969696 ff808080
									vertex_uvs ( 1 3 )
								)
							)
							vertex_sets ( 1
								vertex_set ( 0 0 4 )
							)
							primitives ( 2
								prim_state_idx ( 0 )
								indexed_trilist (
									vertex_idxs ( 6 0 1 2 1 2 3 )
									normal_idxs ( 2 0 3 0 3 )
									flags ( 2 00000000 00000000 )
								)
							)
						)
					)
				)
				distance_level (
					distance_level_header (
						dlevel_selection ( 500 )
						hierarchy ( 2 -1 0 )
					)
					sub_objects ( 1
						sub_object (
							sub_object_header ( 00000400 -1 -1 000001d2 000001c4
								geometry_info ( 2 2 0 6 0 0 2 0 0 0
									geometry_nodes ( 2
										geometry_node ( 1 0 0 0 0
											cullable_prims ( 1 1 3 )
										)
										geometry_node ( 1 0 0 0 0
											cullable_prims ( 1 1 3 )
										)
									)
									geometry_node_map ( 2 0 1 )
								)
								subobject_shaders ( 1 0 )
								subobject_light_cfgs ( 1 0 ) 0
							)
							vertices ( 3
								vertex ( 00000000 0 1 ff969696 ff808080
									vertex_uvs ( 1 0 )
								)
								vertex ( 00000000 1 1 ff969696 ff808080
									vertex_uvs ( 1 1 )
								)
								vertex ( 00000000 4 1 ff969696 ff808080
									vertex_uvs ( 1 3 )
								)
							)
							vertex_sets ( 1
								vertex_set ( 1 0 3 )
							)
							primitives ( 4
								prim_state_idx ( 1 )
								indexed_trilist (
									vertex_idxs ( 3 0 1 2 )
									normal_idxs ( 1 1 3 )
									flags ( 1 00000000 )
								)
								prim_state_idx ( 0 )
								indexed_trilist (
									vertex_idxs ( 3 2 1 0 )
									normal_idxs ( 1 0 3 )
									flags ( 1 00000000 )
								)
							)
						)
					)
				)
			)
		)
	)
)
"#;
